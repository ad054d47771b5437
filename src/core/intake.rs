use crate::core::messages;
use crate::domain::model::{row_for_chapter, ChapterItem, Column, DocumentSummary, RowStatus};
use crate::domain::ports::{Notifier, RowStore, Segmenter};
use crate::utils::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 匯入後要送出哪些章節的審核請求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewPolicy {
    #[default]
    All,
    First,
}

impl FromStr for ReviewPolicy {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ReviewPolicy::All),
            "first" => Ok(ReviewPolicy::First),
            other => Err(FlowError::InvalidConfigValueError {
                field: "intake.review_policy".to_string(),
                value: other.to_string(),
                reason: "expected 'all' or 'first'".to_string(),
            }),
        }
    }
}

impl fmt::Display for ReviewPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReviewPolicy::All => "all",
            ReviewPolicy::First => "first",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeReport {
    pub document_id: String,
    pub chapter_count: usize,
    pub requests_sent: usize,
}

/// 文件匯入：分章、寫入儲存、送出第一關的審核請求
pub struct IntakeService {
    store: Arc<dyn RowStore>,
    notifier: Arc<dyn Notifier>,
    segmenter: Arc<dyn Segmenter>,
    policy: ReviewPolicy,
}

impl IntakeService {
    pub fn new(
        store: Arc<dyn RowStore>,
        notifier: Arc<dyn Notifier>,
        segmenter: Arc<dyn Segmenter>,
        policy: ReviewPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            segmenter,
            policy,
        }
    }

    pub async fn ingest(&self, document_id: &str, text: &str) -> Result<IntakeReport> {
        let chapters = self.segmenter.segment(text);
        tracing::info!(
            document = document_id,
            chapters = chapters.len(),
            "📥 Ingesting document"
        );

        // 先建好每一章的核可請求：文件 ID 過長時在寫入任何資料列之前就失敗
        let requests = chapters
            .iter()
            .enumerate()
            .map(|(index, chapter)| {
                messages::chapter_review_request(None, document_id, index as u32, chapter)
            })
            .collect::<Result<Vec<_>>>()?;

        for (index, chapter) in chapters.iter().enumerate() {
            let row = row_for_chapter(index as u32);
            self.store
                .write_cell(document_id, row, Column::Source, chapter)
                .await?;
            self.store
                .write_cell(
                    document_id,
                    row,
                    Column::Status,
                    RowStatus::ChapterReview.as_str(),
                )
                .await?;
        }

        if chapters.is_empty() {
            tracing::warn!(document = document_id, "⚠️ No chapters found in text");
            return Ok(IntakeReport {
                document_id: document_id.to_string(),
                chapter_count: 0,
                requests_sent: 0,
            });
        }

        if let Err(e) = self.store.format_document(document_id).await {
            tracing::warn!(document = document_id, "⚠️ Formatting failed: {}", e);
        }

        let limit = match self.policy {
            ReviewPolicy::All => requests.len(),
            ReviewPolicy::First => 1,
        };

        let mut requests_sent = 0;
        for (index, request) in requests.iter().enumerate().take(limit) {
            match self.notifier.send(request).await {
                Ok(()) => requests_sent += 1,
                Err(e) => tracing::warn!(
                    document = document_id,
                    chapter = index + 1,
                    "⚠️ Failed to send chapter review request: {}",
                    e
                ),
            }
        }

        tracing::info!(
            document = document_id,
            chapters = chapters.len(),
            requests_sent,
            "✅ Intake complete"
        );
        Ok(IntakeReport {
            document_id: document_id.to_string(),
            chapter_count: chapters.len(),
            requests_sent,
        })
    }

    /// 建立 `<name>_Trans` 文件並寫入標題列
    pub async fn create_project(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FlowError::ConfigValidationError {
                field: "project_name".to_string(),
                message: "Project name is required".to_string(),
            });
        }

        let title = format!("{}_Trans", name);
        let document_id = self.store.create_document(&title).await?;
        tracing::info!(document = %document_id, "📁 Project {} created", name);
        Ok(document_id)
    }

    pub async fn list_projects(&self) -> Result<Vec<DocumentSummary>> {
        let projects = self.store.list_documents().await?;
        tracing::debug!("📚 {} project(s) in {}", projects.len(), self.store.backend_name());
        Ok(projects)
    }

    pub async fn list_chapters(&self, document_id: &str) -> Result<Vec<ChapterItem>> {
        let rows = self.store.read_rows(document_id).await?;
        Ok(rows.iter().filter_map(ChapterItem::from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::adapters::segmenter::SentenceSegmenter;
    use crate::domain::model::OutboundMessage;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<OutboundMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &OutboundMessage) -> Result<()> {
            if self.fail {
                return Err(FlowError::NotifyError {
                    message: "offline".to_string(),
                });
            }
            self.sent.lock().await.push(message.clone());
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn service(
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        policy: ReviewPolicy,
    ) -> IntakeService {
        IntakeService::new(store, notifier, Arc::new(SentenceSegmenter::new()), policy)
    }

    const TEXT: &str = "One. Two. Three.\n\nFour. Five.";

    #[tokio::test]
    async fn test_ingest_writes_rows_and_requests_every_chapter() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let intake = service(store.clone(), notifier.clone(), ReviewPolicy::All);

        let report = intake.ingest("doc", TEXT).await.unwrap();
        assert_eq!(report.chapter_count, 2);
        assert_eq!(report.requests_sent, 2);

        let second = store.snapshot("doc", 3).unwrap();
        assert_eq!(second.source_text, "Four. Five.");
        assert_eq!(second.row_status(), Some(RowStatus::ChapterReview));

        let sent = notifier.sent.lock().await;
        assert_eq!(sent[1].buttons[0].callback_data, "ap_ch:1:doc");
    }

    #[tokio::test]
    async fn test_first_policy_sends_one_request() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let intake = service(store, notifier.clone(), ReviewPolicy::First);

        let report = intake.ingest("doc", TEXT).await.unwrap();
        assert_eq!(report.chapter_count, 2);
        assert_eq!(report.requests_sent, 1);
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let intake = service(store.clone(), notifier, ReviewPolicy::All);

        let report = intake.ingest("doc", TEXT).await.unwrap();
        assert_eq!(report.requests_sent, 0);
        assert!(store.snapshot("doc", 2).is_some());
    }

    #[tokio::test]
    async fn test_oversized_document_id_fails_before_any_write() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let intake = service(store.clone(), notifier.clone(), ReviewPolicy::All);
        let long_id = "d".repeat(60);

        let err = intake.ingest(&long_id, TEXT).await.unwrap_err();
        assert!(matches!(err, FlowError::TokenTooLong { .. }));
        assert!(store.snapshot(&long_id, 2).is_none());
        assert!(store.snapshot(&long_id, 3).is_none());
        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let intake = service(store, notifier.clone(), ReviewPolicy::All);

        let report = intake.ingest("doc", "   ").await.unwrap();
        assert_eq!(report.chapter_count, 0);
        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_project_and_list_chapters() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let intake = service(store, notifier, ReviewPolicy::All);

        assert!(intake.create_project("  ").await.is_err());
        let id = intake.create_project("Storyboard").await.unwrap();
        assert!(intake.list_chapters(&id).await.unwrap().is_empty());

        let projects = intake.list_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, id);
        assert_eq!(projects[0].name, "Storyboard_Trans");

        intake.ingest(&id, TEXT).await.unwrap();
        let chapters = intake.list_chapters(&id).await.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].chapter_number, 1);
        assert_eq!(chapters[0].status, Some(RowStatus::ChapterReview));
    }

    #[test]
    fn test_review_policy_parsing() {
        assert_eq!("First".parse::<ReviewPolicy>().unwrap(), ReviewPolicy::First);
        assert_eq!(ReviewPolicy::default(), ReviewPolicy::All);
        assert!("some".parse::<ReviewPolicy>().is_err());
    }
}
