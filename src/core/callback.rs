//! 按鈕回呼代碼：`<動作>:<章節索引>:<文件 ID>`
//!
//! 動作由決定前綴 (`ap` / `re`) 與關卡後綴 (`ch` / `tr` / `ad`) 組成，例如 `ap_tr:3:1AbC...`。
//! 文件 ID 取第二個冒號之後的全部內容，所以 ID 本身可以包含冒號。

use crate::domain::model::{row_for_chapter, Decision, ReviewStage, RowStatus, MAX_CHAPTER_INDEX};
use crate::utils::error::{FlowError, Result};
use std::fmt;
use std::str::FromStr;

/// Telegram callback_data 的上限
pub const MAX_CALLBACK_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackToken {
    pub decision: Decision,
    pub stage: ReviewStage,
    pub chapter_index: u32,
    pub document_id: String,
}

impl CallbackToken {
    pub fn new(
        decision: Decision,
        stage: ReviewStage,
        chapter_index: u32,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            decision,
            stage,
            chapter_index,
            document_id: document_id.into(),
        }
    }

    /// 章節索引超出可定址的列時回傳錯誤
    pub fn ensure_addressable(&self) -> Result<()> {
        if self.chapter_index > MAX_CHAPTER_INDEX {
            return Err(FlowError::InvalidCallback {
                data: self.to_string(),
                reason: "chapter index out of range".to_string(),
            });
        }
        Ok(())
    }

    pub fn action_code(&self) -> String {
        format!("{}_{}", self.decision.code(), self.stage.code())
    }

    /// 編碼並檢查長度，超過上限時回傳錯誤而不是截斷
    pub fn encode(&self) -> Result<String> {
        let encoded = self.to_string();
        if encoded.len() > MAX_CALLBACK_BYTES {
            return Err(FlowError::TokenTooLong {
                len: encoded.len(),
                limit: MAX_CALLBACK_BYTES,
            });
        }
        Ok(encoded)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let invalid = |reason: &str| FlowError::InvalidCallback {
            data: data.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = data.splitn(3, ':');
        let (action, index, document_id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(action), Some(index), Some(document_id)) => (action, index, document_id),
            _ => return Err(invalid("expected action:chapterIndex:documentId")),
        };

        let (decision_code, stage_code) = action
            .split_once('_')
            .ok_or_else(|| invalid("malformed action code"))?;
        let decision =
            Decision::from_code(decision_code).ok_or_else(|| invalid("unknown decision"))?;
        let stage = ReviewStage::from_code(stage_code).ok_or_else(|| invalid("unknown stage"))?;

        let chapter_index = index
            .parse::<u32>()
            .map_err(|_| invalid("chapter index is not a number"))?;
        if chapter_index > MAX_CHAPTER_INDEX {
            return Err(invalid("chapter index out of range"));
        }

        if document_id.is_empty() {
            return Err(invalid("empty document id"));
        }

        Ok(Self {
            decision,
            stage,
            chapter_index,
            document_id: document_id.to_string(),
        })
    }

    pub fn row_number(&self) -> u32 {
        row_for_chapter(self.chapter_index)
    }

    /// 此代碼有效時，資料列應處於的狀態
    pub fn awaiting_status(&self) -> RowStatus {
        self.stage.awaiting_status()
    }

    pub fn next_status(&self) -> RowStatus {
        self.stage.transition(self.decision)
    }

    /// 顯示用的章節編號 (從 1 開始)
    pub fn chapter_number(&self) -> u32 {
        self.chapter_index.saturating_add(1)
    }

    /// 同一章節同一關卡的另一個決定
    pub fn counterpart(&self) -> Self {
        let decision = match self.decision {
            Decision::Approve => Decision::Reject,
            Decision::Reject => Decision::Approve,
        };
        Self {
            decision,
            ..self.clone()
        }
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.action_code(),
            self.chapter_index,
            self.document_id
        )
    }
}

impl FromStr for CallbackToken {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
