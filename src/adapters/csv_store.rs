use crate::domain::model::{ChapterRow, Column, DocumentSummary, FIRST_DATA_ROW};
use crate::domain::ports::RowStore;
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// 本機 CSV 檔案，每份文件一個 `<id>.csv`，第一列為標題
///
/// 檔案 I/O 都在 blocking 執行緒池上進行，不佔用 async worker
#[derive(Debug)]
pub struct CsvStore {
    base_path: PathBuf,
    // 讀取-修改-寫回 需要序列化
    lock: Mutex<()>,
}

/// 在 blocking 執行緒池上執行同步的檔案操作
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| FlowError::StoreError {
            message: format!("CSV worker failed: {}", e),
        })?
}

impl CsvStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            lock: Mutex::new(()),
        }
    }

    fn document_path(&self, document_id: &str) -> Result<PathBuf> {
        let valid = !document_id.is_empty()
            && document_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !document_id.starts_with('.');
        if !valid {
            return Err(FlowError::StoreError {
                message: format!("Invalid CSV document id: {}", document_id),
            });
        }
        Ok(self.base_path.join(format!("{}.csv", document_id)))
    }

    fn load(path: &Path) -> Result<Vec<Vec<String>>> {
        if !path.exists() {
            return Err(FlowError::StoreError {
                message: format!("Document not found: {}", path.display()),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn save(path: &Path, rows: &[Vec<String>]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        for row in rows {
            // 空列也要保留欄數，避免 CSV reader 跳過
            let mut padded = row.clone();
            padded.resize(Column::ALL.len(), String::new());
            writer.write_record(&padded)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// 設定第 `row` 列的某一欄，文件不存在時從標題列開始
    fn update_cell(path: &Path, row: u32, column: Column, value: &str) -> Result<()> {
        let mut rows = if path.exists() {
            Self::load(path)?
        } else {
            vec![Self::header()]
        };

        let index = row as usize - 1;
        if rows.len() <= index {
            rows.resize(index + 1, Vec::new());
        }
        let cells = &mut rows[index];
        if cells.len() < Column::ALL.len() {
            cells.resize(Column::ALL.len(), String::new());
        }
        cells[column.index()] = value.to_string();

        Self::save(path, &rows)
    }

    fn scan(base_path: &Path) -> Result<Vec<DocumentSummary>> {
        if !base_path.exists() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        for entry in fs::read_dir(base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                projects.push(DocumentSummary {
                    id: stem.to_string(),
                    name: stem.to_string(),
                    link: Some(path.display().to_string()),
                });
            }
        }
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    fn header() -> Vec<String> {
        Column::ALL.iter().map(|c| c.header().to_string()).collect()
    }

    fn slugify(title: &str) -> String {
        let slug: String = title
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if slug.trim_matches('_').is_empty() {
            "document".to_string()
        } else {
            slug
        }
    }
}

#[async_trait]
impl RowStore for CsvStore {
    async fn read_row(&self, document_id: &str, row: u32) -> Result<Option<ChapterRow>> {
        let path = self.document_path(document_id)?;
        let _guard = self.lock.lock().await;
        let rows = blocking(move || Self::load(&path)).await?;

        let index = (row as usize).saturating_sub(1);
        Ok(rows
            .get(index)
            .filter(|_| row >= 1)
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .map(|cells| ChapterRow::from_cells(row, cells)))
    }

    async fn read_rows(&self, document_id: &str) -> Result<Vec<ChapterRow>> {
        let path = self.document_path(document_id)?;
        let _guard = self.lock.lock().await;
        let rows = blocking(move || Self::load(&path)).await?;

        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, cells)| (i as u32 + 1, cells))
            .filter(|(row, _)| *row >= FIRST_DATA_ROW)
            .map(|(row, cells)| ChapterRow::from_cells(row, cells))
            .collect())
    }

    async fn write_cell(
        &self,
        document_id: &str,
        row: u32,
        column: Column,
        value: &str,
    ) -> Result<()> {
        if row == 0 {
            return Err(FlowError::StoreError {
                message: "Row numbers start at 1".to_string(),
            });
        }
        let path = self.document_path(document_id)?;
        let _guard = self.lock.lock().await;

        let value = value.to_string();
        blocking(move || Self::update_cell(&path, row, column, &value)).await?;
        tracing::debug!(
            "💾 {}!{}{} updated",
            document_id,
            column.letter(),
            row
        );
        Ok(())
    }

    async fn create_document(&self, title: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let base = Self::slugify(title);
        let base_path = self.base_path.clone();

        let id = blocking(move || {
            let mut id = base.clone();
            let mut suffix = 1;
            while base_path.join(format!("{}.csv", id)).exists() {
                suffix += 1;
                id = format!("{}-{}", base, suffix);
            }
            Self::save(&base_path.join(format!("{}.csv", id)), &[Self::header()])?;
            Ok(id)
        })
        .await?;
        tracing::info!("📄 Created CSV document {}", id);
        Ok(id)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let base_path = self.base_path.clone();
        let _guard = self.lock.lock().await;
        blocking(move || Self::scan(&base_path)).await
    }

    fn backend_name(&self) -> &'static str {
        "csv"
    }
}
