use crate::utils::error::{FlowError, Result};
use reqwest::Client;
use std::io::{Cursor, Read};
use std::path::Path;
use url::Url;

pub const DEFAULT_DOCS_BASE: &str = "https://docs.google.com";

/// 來源文件讀取：本機 .txt / .docx / .pdf 或公開分享的 Google Docs 連結
pub struct DocumentLoader {
    client: Client,
    docs_base: String,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::with_docs_base(DEFAULT_DOCS_BASE)
    }
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_docs_base(docs_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            docs_base: docs_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn load_file(&self, path: &Path) -> Result<String> {
        let name = path.to_string_lossy().to_string();
        // 不支援的格式不必讀檔
        let kind = DocumentKind::from_name(&name)?;
        let bytes = tokio::fs::read(path).await?;
        tracing::info!("📂 Loaded {} ({} bytes)", name, bytes.len());
        kind.parse(&name, &bytes)
    }

    pub async fn fetch_url(&self, url: &str) -> Result<String> {
        let file_id = google_file_id(url)?;
        let export_url = format!("{}/document/d/{}/export", self.docs_base, file_id);

        tracing::info!("🌐 Exporting Google Doc {}", file_id);
        let response = self
            .client
            .get(export_url)
            .query(&[("format", "txt")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FlowError::UnsupportedDocument {
                name: format!(
                    "{} (HTTP {}; make sure the document is shared publicly)",
                    url,
                    response.status()
                ),
            });
        }

        let text = response.text().await?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }
}

/// 依副檔名判斷的來源格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Docx,
    Pdf,
}

impl DocumentKind {
    pub fn from_name(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("txt") => Ok(DocumentKind::Text),
            Some("docx") => Ok(DocumentKind::Docx),
            Some("pdf") => Ok(DocumentKind::Pdf),
            _ => Err(FlowError::UnsupportedDocument {
                name: format!("{} (expected .txt, .docx or .pdf)", name),
            }),
        }
    }

    fn parse(self, name: &str, bytes: &[u8]) -> Result<String> {
        match self {
            DocumentKind::Text => {
                let text = String::from_utf8_lossy(bytes);
                Ok(text.trim_start_matches('\u{feff}').to_string())
            }
            DocumentKind::Docx => docx_text(bytes),
            DocumentKind::Pdf => pdf_text(name, bytes),
        }
    }
}

/// 依副檔名解析內容
pub fn parse_bytes(name: &str, bytes: &[u8]) -> Result<String> {
    DocumentKind::from_name(name)?.parse(name, bytes)
}

/// 從 Google Docs / Drive 連結取出檔案 ID
pub fn google_file_id(url: &str) -> Result<String> {
    let unsupported = || FlowError::UnsupportedDocument {
        name: url.to_string(),
    };

    let parsed = Url::parse(url).map_err(|_| unsupported())?;
    match parsed.host_str() {
        Some("docs.google.com") | Some("drive.google.com") => {}
        _ => return Err(unsupported()),
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();

    segments
        .windows(3)
        .find(|w| matches!(w[0], "document" | "file") && w[1] == "d" && !w[2].is_empty())
        .map(|w| w[2].to_string())
        .ok_or_else(unsupported)
}

fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;
    Ok(extract_runs(&xml))
}

fn pdf_text(name: &str, bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        FlowError::UnsupportedDocument {
            name: format!("{} (unreadable PDF: {})", name, e),
        }
    })?;
    if text.trim().is_empty() {
        // 掃描檔沒有文字層
        return Err(FlowError::UnsupportedDocument {
            name: format!("{} (PDF has no extractable text)", name),
        });
    }
    Ok(text.trim().to_string())
}

/// 取出 `<w:t>` 文字，段落之間以空白行分隔
fn extract_runs(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let tag = &rest[start + 1..start + len];
        let after = &rest[start + len + 1..];
        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or("");

        match name {
            "w:t" if !tag.ends_with('/') => {
                let end = after.find("</w:t>").unwrap_or(after.len());
                out.push_str(&unescape(&after[..end]));
                rest = &after[end..];
                continue;
            }
            "w:tab" => out.push('\t'),
            "w:br" | "w:cr" => out.push('\n'),
            "/w:p" => out.push_str("\n\n"),
            _ => {}
        }
        rest = after;
    }

    out.trim_end().to_string()
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::{FileOptions, ZipWriter};

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file::<_, ()>("word/document.xml", FileOptions::default())
            .unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_paragraphs_and_entities() {
        let xml = r#"<?xml version="1.0"?><w:document><w:body>
            <w:p><w:r><w:t>Tom &amp; Jerry</w:t></w:r><w:r><w:t xml:space="preserve"> ran.</w:t></w:r></w:p>
            <w:p><w:r><w:t>Line</w:t><w:br/><w:t>break.</w:t></w:r></w:p>
            </w:body></w:document>"#;
        let text = parse_bytes("Book.DOCX", &build_docx(xml)).unwrap();
        assert_eq!(text, "Tom & Jerry ran.\n\nLine\nbreak.");
    }

    #[test]
    fn test_docx_without_body_is_zip_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file::<_, ()>("other.xml", FileOptions::default())
            .unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(
            parse_bytes("a.docx", &bytes),
            Err(FlowError::ZipError(_))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_bytes("notes.epub", b"PK").unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedDocument { .. }));
        assert!(parse_bytes("README", b"text").is_err());
    }

    #[test]
    fn test_kind_from_name_ignores_case() {
        assert_eq!(DocumentKind::from_name("a/b/Story.TXT").unwrap(), DocumentKind::Text);
        assert_eq!(DocumentKind::from_name("Book.Docx").unwrap(), DocumentKind::Docx);
        assert_eq!(DocumentKind::from_name("scan.pdf").unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn test_corrupt_pdf_is_unsupported_document() {
        let err = parse_bytes("scan.pdf", b"this is not a pdf").unwrap_err();
        match err {
            FlowError::UnsupportedDocument { name } => assert!(name.starts_with("scan.pdf")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_file_is_rejected_before_reading() {
        // 檔案不存在，若先讀檔會得到 IoError
        let err = DocumentLoader::new()
            .load_file(Path::new("/nonexistent/chapter.rtf"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedDocument { .. }));
    }

    #[tokio::test]
    async fn test_load_txt_file_strips_bom() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("story.txt");
        std::fs::write(&path, "\u{feff}Once upon a time.").unwrap();

        let text = DocumentLoader::new().load_file(&path).await.unwrap();
        assert_eq!(text, "Once upon a time.");
    }

    #[test]
    fn test_google_file_id_formats() {
        assert_eq!(
            google_file_id("https://docs.google.com/document/d/abc123/edit?usp=sharing").unwrap(),
            "abc123"
        );
        assert_eq!(
            google_file_id("https://drive.google.com/file/d/XYZ_9/view").unwrap(),
            "XYZ_9"
        );
        assert!(google_file_id("https://example.com/document/d/abc").is_err());
        assert!(google_file_id("https://docs.google.com/spreadsheets/u/0").is_err());
    }

    #[tokio::test]
    async fn test_fetch_url_uses_text_export() {
        let server = MockServer::start();
        let export_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/document/d/abc123/export")
                .query_param("format", "txt");
            then.status(200).body("First. Second.");
        });

        let loader = DocumentLoader::with_docs_base(server.base_url());
        let text = loader
            .fetch_url("https://docs.google.com/document/d/abc123/edit")
            .await
            .unwrap();
        export_mock.assert();
        assert_eq!(text, "First. Second.");
    }

    #[tokio::test]
    async fn test_fetch_private_document_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/document/d/private/export");
            then.status(401);
        });

        let loader = DocumentLoader::with_docs_base(server.base_url());
        assert!(loader
            .fetch_url("https://docs.google.com/document/d/private/edit")
            .await
            .is_err());
    }
}
