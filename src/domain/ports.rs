use crate::domain::model::{ChapterRow, Column, DocumentSummary, OutboundMessage, Task};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 以列為單位的外部儲存 (Google Sheets、CSV 等)
#[async_trait]
pub trait RowStore: Send + Sync {
    /// 讀取單列，整列為空時回傳 None
    async fn read_row(&self, document_id: &str, row: u32) -> Result<Option<ChapterRow>>;

    /// 讀取所有資料列 (不含標題列)
    async fn read_rows(&self, document_id: &str) -> Result<Vec<ChapterRow>>;

    async fn write_cell(
        &self,
        document_id: &str,
        row: u32,
        column: Column,
        value: &str,
    ) -> Result<()>;

    /// 建立新文件並回傳其 ID
    async fn create_document(&self, title: &str) -> Result<String>;

    /// 列出此後端管理的專案文件，依名稱排序
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;

    async fn format_document(&self, _document_id: &str) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;
}

#[async_trait]
pub trait TextTransformer: Send + Sync {
    async fn transform(&self, task: Task, text: &str) -> Result<String>;

    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<()>;

    /// 回應按鈕點擊，消除客戶端的讀取狀態
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()>;

    fn name(&self) -> &'static str;
}

pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<String>;
}
