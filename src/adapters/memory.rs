use crate::domain::model::{ChapterRow, Column, DocumentSummary, FIRST_DATA_ROW};
use crate::domain::ports::RowStore;
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

type Document = BTreeMap<u32, Vec<String>>;

/// 行程內的儲存，用於 dry run 與測試
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Document>>,
    titles: Mutex<BTreeMap<String, String>>,
    next_id: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> MutexGuard<'_, HashMap<String, Document>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_document(&self, document_id: &str) {
        self.documents()
            .entry(document_id.to_string())
            .or_default();
    }

    pub fn snapshot(&self, document_id: &str, row: u32) -> Option<ChapterRow> {
        self.documents()
            .get(document_id)
            .and_then(|doc| doc.get(&row))
            .map(|cells| ChapterRow::from_cells(row, cells))
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn read_row(&self, document_id: &str, row: u32) -> Result<Option<ChapterRow>> {
        let docs = self.documents();
        let doc = docs
            .get(document_id)
            .ok_or_else(|| FlowError::StoreError {
                message: format!("Unknown document: {}", document_id),
            })?;

        Ok(doc
            .get(&row)
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .map(|cells| ChapterRow::from_cells(row, cells)))
    }

    async fn read_rows(&self, document_id: &str) -> Result<Vec<ChapterRow>> {
        let docs = self.documents();
        let doc = docs
            .get(document_id)
            .ok_or_else(|| FlowError::StoreError {
                message: format!("Unknown document: {}", document_id),
            })?;

        Ok(doc
            .range(FIRST_DATA_ROW..)
            .map(|(row, cells)| ChapterRow::from_cells(*row, cells))
            .collect())
    }

    async fn write_cell(
        &self,
        document_id: &str,
        row: u32,
        column: Column,
        value: &str,
    ) -> Result<()> {
        let mut docs = self.documents();
        let cells = docs
            .entry(document_id.to_string())
            .or_default()
            .entry(row)
            .or_insert_with(|| vec![String::new(); Column::ALL.len()]);
        cells[column.index()] = value.to_string();
        Ok(())
    }

    async fn create_document(&self, title: &str) -> Result<String> {
        let id = {
            let mut next = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            format!("mem-{}", *next)
        };
        let header = Column::ALL.iter().map(|c| c.header().to_string()).collect();

        self.documents().entry(id.clone()).or_default().insert(1, header);
        self.titles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), title.to_string());
        tracing::debug!("📄 Created in-memory document {} ({})", id, title);
        Ok(id)
    }

    /// 只列出透過 create_document 建立的文件
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let titles = self.titles.lock().unwrap_or_else(|e| e.into_inner());
        let mut projects: Vec<DocumentSummary> = titles
            .iter()
            .map(|(id, name)| DocumentSummary {
                id: id.clone(),
                name: name.clone(),
                link: None,
            })
            .collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
