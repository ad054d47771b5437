use crate::core::callback::CallbackToken;
use crate::core::messages;
use crate::domain::model::{
    CallbackQuery, ChapterRow, Column, Decision, OutboundMessage, ReviewStage, RowStatus, Task,
};
use crate::domain::ports::{Notifier, RowStore, TextTransformer};
use crate::utils::error::{FlowError, Result};
use serde::Serialize;
use std::sync::Arc;

/// 套用一次按鈕回呼的結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// 核可並前進到下一個狀態
    Advanced { to: RowStatus },
    Rejected,
    /// 資料列已經在下一個關卡，重新送出該關卡的核可請求
    Redelivered { stage: ReviewStage },
    /// 重複或過期的回呼，沒有任何副作用
    Stale { current: Option<RowStatus> },
    RowMissing,
    Invalid { reason: String },
}

impl Outcome {
    pub fn acknowledgement(&self) -> &'static str {
        match self {
            Outcome::Invalid { .. } => "Error: Invalid data",
            Outcome::Stale { .. } | Outcome::Redelivered { .. } => "Already processed",
            Outcome::RowMissing => "Error: Row not found",
            Outcome::Advanced { .. } | Outcome::Rejected => "Processed",
        }
    }
}

/// 核可流程的狀態機
///
/// 每個回呼代碼指向一個章節與一個關卡。只有在資料列處於該關卡的等待狀態時才會套用；
/// 狀態欄永遠在它所依賴的內容寫入之後才更新，所以中途失敗時重送同一個回呼會重做整個步驟。
pub struct WorkflowEngine {
    store: Arc<dyn RowStore>,
    transformer: Arc<dyn TextTransformer>,
    notifier: Arc<dyn Notifier>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn RowStore>,
        transformer: Arc<dyn TextTransformer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            transformer,
            notifier,
        }
    }

    pub fn store(&self) -> Arc<dyn RowStore> {
        Arc::clone(&self.store)
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    pub fn transformer_name(&self) -> &'static str {
        self.transformer.name()
    }

    /// 處理聊天平台送來的按鈕點擊
    pub async fn handle_callback(&self, query: &CallbackQuery) -> Result<Outcome> {
        let parsed = match query.data.as_deref() {
            Some(data) => CallbackToken::parse(data),
            None => Err(FlowError::InvalidCallback {
                data: String::new(),
                reason: "callback query without data".to_string(),
            }),
        };

        let token = match parsed {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(callback_id = %query.id, "❌ Invalid callback data: {}", e);
                let outcome = Outcome::Invalid {
                    reason: e.to_string(),
                };
                self.acknowledge(&query.id, outcome.acknowledgement()).await;
                return Ok(outcome);
            }
        };

        let result = self.apply(&token, query.chat_id.as_deref()).await;

        let ack = match &result {
            Ok(outcome) => outcome.acknowledgement(),
            Err(_) => "Error: please retry",
        };
        self.acknowledge(&query.id, ack).await;

        result
    }

    /// 人工核可入口 (不經過聊天平台)
    pub async fn decide(
        &self,
        document_id: &str,
        chapter_index: u32,
        stage: ReviewStage,
        decision: Decision,
    ) -> Result<Outcome> {
        let token = CallbackToken::new(decision, stage, chapter_index, document_id);
        self.apply(&token, None).await
    }

    pub async fn apply(&self, token: &CallbackToken, reply_chat: Option<&str>) -> Result<Outcome> {
        token.ensure_addressable()?;
        let row_number = token.row_number();
        tracing::info!(
            document = %token.document_id,
            chapter = token.chapter_number(),
            action = %token.action_code(),
            "📥 Applying callback"
        );

        let row = match self.store.read_row(&token.document_id, row_number).await? {
            Some(row) => row,
            None => {
                tracing::warn!(
                    document = %token.document_id,
                    row = row_number,
                    "⚠️ Row not found for callback"
                );
                self.notify_best_effort(OutboundMessage::text(
                    reply_chat,
                    messages::ROW_MISSING_MESSAGE,
                ))
                .await;
                return Ok(Outcome::RowMissing);
            }
        };

        let current = row.row_status();
        if current != Some(token.awaiting_status()) {
            return self.handle_stale(token, &row, current, reply_chat).await;
        }

        match (token.decision, token.stage) {
            (Decision::Reject, stage) => self.reject(token, stage, reply_chat).await,
            (Decision::Approve, ReviewStage::Chapter) => {
                self.approve_chapter(token, &row, reply_chat).await
            }
            (Decision::Approve, ReviewStage::Translation) => {
                self.approve_translation(token, &row, reply_chat).await
            }
            (Decision::Approve, ReviewStage::Adaptation) => {
                self.approve_adaptation(token, &row, reply_chat).await
            }
        }
    }

    async fn approve_chapter(
        &self,
        token: &CallbackToken,
        row: &ChapterRow,
        reply_chat: Option<&str>,
    ) -> Result<Outcome> {
        let source = self.require(token, row, Column::Source)?;
        self.send_progress(token, reply_chat).await;

        let translated = self.run_transform(Task::Translate, source).await?;
        self.write(token, Column::Translated, &translated).await?;
        self.write(token, Column::Status, token.next_status().as_str())
            .await?;

        let request = messages::translation_review_request(
            reply_chat,
            &token.document_id,
            token.chapter_index,
            source,
            &translated,
        )?;
        self.notifier.send(&request).await?;

        tracing::info!(
            document = %token.document_id,
            chapter = token.chapter_number(),
            "🔄 Translation ready for review"
        );
        Ok(Outcome::Advanced {
            to: token.next_status(),
        })
    }

    async fn approve_translation(
        &self,
        token: &CallbackToken,
        row: &ChapterRow,
        reply_chat: Option<&str>,
    ) -> Result<Outcome> {
        let translated = self.require(token, row, Column::Translated)?;
        self.send_progress(token, reply_chat).await;

        let adapted = self.run_transform(Task::Adapt, translated).await?;
        self.write(token, Column::Adapted, &adapted).await?;
        self.write(token, Column::Status, token.next_status().as_str())
            .await?;

        let request = messages::adaptation_review_request(
            reply_chat,
            &token.document_id,
            token.chapter_index,
            translated,
            &adapted,
        )?;
        self.notifier.send(&request).await?;

        tracing::info!(
            document = %token.document_id,
            chapter = token.chapter_number(),
            "✨ Adaptation ready for review"
        );
        Ok(Outcome::Advanced {
            to: token.next_status(),
        })
    }

    async fn approve_adaptation(
        &self,
        token: &CallbackToken,
        row: &ChapterRow,
        reply_chat: Option<&str>,
    ) -> Result<Outcome> {
        let adapted = self.require(token, row, Column::Adapted)?;

        // 最終版本 = 改寫版本
        self.write(token, Column::Final, adapted).await?;
        self.write(token, Column::Status, token.next_status().as_str())
            .await?;

        self.notify_best_effort(OutboundMessage::text(
            reply_chat,
            messages::completion_message(token.chapter_number()),
        ))
        .await;

        tracing::info!(
            document = %token.document_id,
            chapter = token.chapter_number(),
            "🎉 Chapter completed"
        );
        Ok(Outcome::Advanced {
            to: token.next_status(),
        })
    }

    async fn reject(
        &self,
        token: &CallbackToken,
        stage: ReviewStage,
        reply_chat: Option<&str>,
    ) -> Result<Outcome> {
        self.write(token, Column::Status, RowStatus::Rejected.as_str())
            .await?;

        self.notify_best_effort(OutboundMessage::text(
            reply_chat,
            messages::rejection_message(stage, token.chapter_number()),
        ))
        .await;

        tracing::info!(
            document = %token.document_id,
            chapter = token.chapter_number(),
            stage = stage.label(),
            "❌ Rejected"
        );
        Ok(Outcome::Rejected)
    }

    /// 狀態不符的回呼：重複點擊、舊訊息上的按鈕，或是平台重送。
    /// 如果核可已經生效但下一個核可請求沒送出，重送該請求。
    async fn handle_stale(
        &self,
        token: &CallbackToken,
        row: &ChapterRow,
        current: Option<RowStatus>,
        reply_chat: Option<&str>,
    ) -> Result<Outcome> {
        let already_advanced =
            token.decision == Decision::Approve && current == Some(token.next_status());

        let pending_stage = current.and_then(ReviewStage::from_status);
        if let (true, Some(stage)) = (already_advanced, pending_stage) {
            if let Some(request) = self.pending_request(token, row, stage, reply_chat)? {
                tracing::info!(
                    document = %token.document_id,
                    chapter = token.chapter_number(),
                    stage = stage.label(),
                    "🔁 Re-sending pending review request"
                );
                self.notifier.send(&request).await?;
                return Ok(Outcome::Redelivered { stage });
            }
        }

        tracing::info!(
            document = %token.document_id,
            chapter = token.chapter_number(),
            action = %token.action_code(),
            current = current.map(|s| s.as_str()).unwrap_or("<none>"),
            "⏭️ Ignoring stale callback"
        );
        Ok(Outcome::Stale { current })
    }

    fn pending_request(
        &self,
        token: &CallbackToken,
        row: &ChapterRow,
        stage: ReviewStage,
        reply_chat: Option<&str>,
    ) -> Result<Option<OutboundMessage>> {
        let request = match stage {
            ReviewStage::Chapter => None,
            ReviewStage::Translation if !row.translated_text.trim().is_empty() => {
                Some(messages::translation_review_request(
                    reply_chat,
                    &token.document_id,
                    token.chapter_index,
                    &row.source_text,
                    &row.translated_text,
                )?)
            }
            ReviewStage::Adaptation if !row.adapted_text.trim().is_empty() => {
                Some(messages::adaptation_review_request(
                    reply_chat,
                    &token.document_id,
                    token.chapter_index,
                    &row.translated_text,
                    &row.adapted_text,
                )?)
            }
            _ => None,
        };
        Ok(request)
    }

    fn require<'a>(
        &self,
        token: &CallbackToken,
        row: &'a ChapterRow,
        column: Column,
    ) -> Result<&'a str> {
        let value = row.get(column);
        if value.trim().is_empty() {
            return Err(FlowError::MissingContent {
                document: token.document_id.clone(),
                row: row.row_number,
                column: column.to_string(),
            });
        }
        Ok(value)
    }

    async fn run_transform(&self, task: Task, text: &str) -> Result<String> {
        tracing::debug!(
            task = task.as_str(),
            transformer = self.transformer.name(),
            chars = text.chars().count(),
            "🤖 Running text transformation"
        );
        let output = self.transformer.transform(task, text).await?;
        if output.trim().is_empty() {
            return Err(FlowError::TransformationError {
                stage: task.as_str().to_string(),
                details: "transformer returned empty text".to_string(),
            });
        }
        Ok(output)
    }

    async fn write(&self, token: &CallbackToken, column: Column, value: &str) -> Result<()> {
        self.store
            .write_cell(&token.document_id, token.row_number(), column, value)
            .await
    }

    async fn send_progress(&self, token: &CallbackToken, reply_chat: Option<&str>) {
        if let Some(text) = messages::progress_message(token) {
            self.notify_best_effort(OutboundMessage::text(reply_chat, text))
                .await;
        }
    }

    async fn notify_best_effort(&self, message: OutboundMessage) {
        if let Err(e) = self.notifier.send(&message).await {
            tracing::warn!("⚠️ Failed to send notification via {}: {}", self.notifier.name(), e);
        }
    }

    async fn acknowledge(&self, callback_id: &str, text: &str) {
        // 回應太慢時平台會拒絕，忽略即可
        if let Err(e) = self.notifier.answer_callback(callback_id, text).await {
            tracing::debug!("answerCallbackQuery failed/skipped: {}", e);
        }
    }
}
