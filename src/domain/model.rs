use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 第 1 列是標題列，章節 0 從第 2 列開始
pub const FIRST_DATA_ROW: u32 = 2;
/// 列號不能超出 u32 的最大章節索引
pub const MAX_CHAPTER_INDEX: u32 = u32::MAX - FIRST_DATA_ROW;

/// 章節在流程中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    ChapterReview,
    Translation,
    Adaptation,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ChapterReview => "CHAPTER_REVIEW",
            Stage::Translation => "TRANSLATION",
            Stage::Adaptation => "ADAPTATION",
            Stage::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 狀態欄 (E) 的值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    ChapterReview,
    Translation,
    Adaptation,
    Completed,
    Rejected,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::ChapterReview => "CHAPTER_REVIEW",
            RowStatus::Translation => "TRANSLATION",
            RowStatus::Adaptation => "ADAPTATION",
            RowStatus::Completed => "COMPLETED",
            RowStatus::Rejected => "REJECTED",
        }
    }

    /// 空字串或無法辨識的值視為沒有狀態
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "CHAPTER_REVIEW" => Some(RowStatus::ChapterReview),
            "TRANSLATION" => Some(RowStatus::Translation),
            "ADAPTATION" => Some(RowStatus::Adaptation),
            "COMPLETED" => Some(RowStatus::Completed),
            "REJECTED" => Some(RowStatus::Rejected),
            _ => None,
        }
    }

    /// REJECTED 沒有對應的 stage
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RowStatus::ChapterReview => Some(Stage::ChapterReview),
            RowStatus::Translation => Some(Stage::Translation),
            RowStatus::Adaptation => Some(Stage::Adaptation),
            RowStatus::Completed => Some(Stage::Completed),
            RowStatus::Rejected => None,
        }
    }

    pub fn approval_status(&self) -> ApprovalStatus {
        match self {
            RowStatus::Completed => ApprovalStatus::Approved,
            RowStatus::Rejected => ApprovalStatus::Rejected,
            _ => ApprovalStatus::Pending,
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// 需要人工核可的三個關卡
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    Chapter,
    Translation,
    Adaptation,
}

impl ReviewStage {
    pub const ALL: [ReviewStage; 3] = [
        ReviewStage::Chapter,
        ReviewStage::Translation,
        ReviewStage::Adaptation,
    ];

    /// 等待此關卡核可時，狀態欄的值
    pub fn awaiting_status(&self) -> RowStatus {
        match self {
            ReviewStage::Chapter => RowStatus::ChapterReview,
            ReviewStage::Translation => RowStatus::Translation,
            ReviewStage::Adaptation => RowStatus::Adaptation,
        }
    }

    pub fn from_status(status: RowStatus) -> Option<Self> {
        match status {
            RowStatus::ChapterReview => Some(ReviewStage::Chapter),
            RowStatus::Translation => Some(ReviewStage::Translation),
            RowStatus::Adaptation => Some(ReviewStage::Adaptation),
            RowStatus::Completed | RowStatus::Rejected => None,
        }
    }

    /// 固定的轉移表
    pub fn transition(&self, decision: Decision) -> RowStatus {
        match (self, decision) {
            (_, Decision::Reject) => RowStatus::Rejected,
            (ReviewStage::Chapter, Decision::Approve) => RowStatus::Translation,
            (ReviewStage::Translation, Decision::Approve) => RowStatus::Adaptation,
            (ReviewStage::Adaptation, Decision::Approve) => RowStatus::Completed,
        }
    }

    /// 回呼代碼中的關卡後綴
    pub fn code(&self) -> &'static str {
        match self {
            ReviewStage::Chapter => "ch",
            ReviewStage::Translation => "tr",
            ReviewStage::Adaptation => "ad",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ch" => Some(ReviewStage::Chapter),
            "tr" => Some(ReviewStage::Translation),
            "ad" => Some(ReviewStage::Adaptation),
            _ => None,
        }
    }

    /// 給人看的名稱
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStage::Chapter => "Chapter",
            ReviewStage::Translation => "Translation",
            ReviewStage::Adaptation => "Adaptation",
        }
    }
}

impl FromStr for ReviewStage {
    type Err = String;

    /// 接受關卡名稱、回呼後綴或狀態欄的值
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chapter" | "ch" | "chapter_review" => Ok(ReviewStage::Chapter),
            "translation" | "tr" => Ok(ReviewStage::Translation),
            "adaptation" | "ad" => Ok(ReviewStage::Adaptation),
            other => Err(format!("unknown review stage: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn code(&self) -> &'static str {
        match self {
            Decision::Approve => "ap",
            Decision::Reject => "re",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ap" => Some(Decision::Approve),
            "re" => Some(Decision::Reject),
            _ => None,
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "ap" => Ok(Decision::Approve),
            "reject" | "re" => Ok(Decision::Reject),
            other => Err(format!("unknown decision: {}", other)),
        }
    }
}

/// 資料表中的欄位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Source,
    Translated,
    Adapted,
    Final,
    Status,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Source,
        Column::Translated,
        Column::Adapted,
        Column::Final,
        Column::Status,
    ];

    pub fn letter(&self) -> &'static str {
        match self {
            Column::Source => "A",
            Column::Translated => "B",
            Column::Adapted => "C",
            Column::Final => "D",
            Column::Status => "E",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Column::Source => 0,
            Column::Translated => 1,
            Column::Adapted => 2,
            Column::Final => 3,
            Column::Status => 4,
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            Column::Source => "Source",
            Column::Translated => "Translation",
            Column::Adapted => "Adaptation",
            Column::Final => "Final",
            Column::Status => "Status",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.header(), self.letter())
    }
}

/// 資料表中的一列 (一個章節)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterRow {
    pub row_number: u32,
    pub source_text: String,
    pub translated_text: String,
    pub adapted_text: String,
    pub final_text: String,
    pub status: String,
}

impl ChapterRow {
    /// 從儲存層讀到的原始欄位建立，缺少的欄位補空字串
    pub fn from_cells(row_number: u32, cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            row_number,
            source_text: cell(0),
            translated_text: cell(1),
            adapted_text: cell(2),
            final_text: cell(3),
            status: cell(4),
        }
    }

    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::Source => &self.source_text,
            Column::Translated => &self.translated_text,
            Column::Adapted => &self.adapted_text,
            Column::Final => &self.final_text,
            Column::Status => &self.status,
        }
    }

    pub fn row_status(&self) -> Option<RowStatus> {
        RowStatus::parse(&self.status)
    }

    pub fn chapter_index(&self) -> Option<u32> {
        self.row_number.checked_sub(FIRST_DATA_ROW)
    }
}

pub fn row_for_chapter(chapter_index: u32) -> u32 {
    chapter_index.saturating_add(FIRST_DATA_ROW)
}

/// 列表用的章節檢視
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterItem {
    pub chapter_number: u32,
    pub row_number: u32,
    pub source_text: String,
    pub translated_text: Option<String>,
    pub adapted_text: Option<String>,
    pub final_text: Option<String>,
    pub stage: Option<Stage>,
    pub status: Option<RowStatus>,
    pub approval_status: ApprovalStatus,
}

impl ChapterItem {
    pub fn from_row(row: &ChapterRow) -> Option<Self> {
        let chapter_index = row.chapter_index()?;
        if row.source_text.trim().is_empty() {
            return None;
        }
        let non_empty = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };
        let status = row.row_status();

        Some(Self {
            chapter_number: chapter_index.saturating_add(1),
            row_number: row.row_number,
            source_text: row.source_text.clone(),
            translated_text: non_empty(&row.translated_text),
            adapted_text: non_empty(&row.adapted_text),
            final_text: non_empty(&row.final_text),
            stage: status.and_then(|s| s.stage()),
            status,
            approval_status: status
                .map(|s| s.approval_status())
                .unwrap_or(ApprovalStatus::Pending),
        })
    }
}

/// 專案清單中的一份文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// AI 轉換的種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Translate,
    Adapt,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Translate => "translate",
            Task::Adapt => "adapt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub label: String,
    pub callback_data: String,
}

/// 送往聊天介面的訊息，chat_id 為 None 時使用預設聊天室
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: Option<String>,
    pub text: String,
    pub buttons: Vec<ActionButton>,
}

impl OutboundMessage {
    pub fn text(chat_id: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.map(str::to_string),
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<ActionButton>) -> Self {
        self.buttons = buttons;
        self
    }
}

/// 按鈕點擊 (與平台無關的形式)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub chat_id: Option<String>,
}
