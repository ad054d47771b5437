use crate::domain::model::{ChapterRow, Column, DocumentSummary, FIRST_DATA_ROW};
use crate::domain::ports::RowStore;
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use url::Url;

pub const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_DRIVE_API: &str = "https://www.googleapis.com";
pub const DEFAULT_DRIVE_FOLDER: &str = "TransAuto";

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

/// Google API 的認證方式
pub enum GoogleAuth {
    /// 預先取得的 access token (測試或短期使用)
    StaticToken(String),
    /// 服務帳戶：簽署 JWT 換取 access token 並快取
    ServiceAccount {
        client_email: String,
        private_key: String,
        token_uri: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ServiceAccountClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

impl GoogleAuth {
    pub fn service_account(
        client_email: impl Into<String>,
        private_key: impl Into<String>,
        token_uri: impl Into<String>,
    ) -> Self {
        GoogleAuth::ServiceAccount {
            client_email: client_email.into(),
            private_key: private_key.into(),
            token_uri: token_uri.into(),
            cached: Mutex::new(None),
        }
    }

    async fn access_token(&self, client: &Client) -> Result<String> {
        match self {
            GoogleAuth::StaticToken(token) => Ok(token.clone()),
            GoogleAuth::ServiceAccount {
                client_email,
                private_key,
                token_uri,
                cached,
            } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if token.expires_at > Utc::now() {
                        return Ok(token.access_token.clone());
                    }
                }

                let fresh =
                    Self::exchange_assertion(client, client_email, private_key, token_uri).await?;
                let access_token = fresh.access_token.clone();
                *cached = Some(fresh);
                Ok(access_token)
            }
        }
    }

    /// 以服務帳戶私鑰簽署 RS256 JWT assertion，有效一小時
    fn signed_assertion(
        client_email: &str,
        private_key: &str,
        token_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let claims = ServiceAccountClaims {
            iss: client_email,
            scope: SCOPES.join(" "),
            aud: token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let key = EncodingKey::from_rsa_pem(private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn exchange_assertion(
        client: &Client,
        client_email: &str,
        private_key: &str,
        token_uri: &str,
    ) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = Self::signed_assertion(client_email, private_key, token_uri, now)?;

        tracing::debug!("🔑 Exchanging service account assertion for access token");
        let response = client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::StoreError {
                message: format!("Token exchange failed ({}): {}", status, body),
            });
        }

        let token: TokenResponse = response.json().await?;
        // 提早一分鐘過期，避免邊界上的失敗
        let lifetime = token.expires_in.unwrap_or(3600).max(120) - 60;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    values: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    web_view_link: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Google Sheets v4 REST 介面，專案資料夾走 Drive v3
pub struct SheetsStore {
    client: Client,
    api_base: String,
    drive_api_base: String,
    /// 新試算表放進的 Drive 資料夾，None 時留在根目錄
    folder: Option<String>,
    sheet_name: String,
    auth: GoogleAuth,
}

/// Drive 查詢字串中的單引號字面值
fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl SheetsStore {
    pub fn new(auth: GoogleAuth, sheet_name: impl Into<String>) -> Self {
        Self::with_api_base(auth, sheet_name, DEFAULT_SHEETS_API)
    }

    pub fn with_api_base(
        auth: GoogleAuth,
        sheet_name: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            drive_api_base: DEFAULT_DRIVE_API.to_string(),
            folder: None,
            sheet_name: sheet_name.into(),
            auth,
        }
    }

    /// 將新建的試算表收進 `folder` 資料夾 (不存在時建立)
    pub fn with_drive(mut self, drive_api_base: impl Into<String>, folder: Option<String>) -> Self {
        self.drive_api_base = drive_api_base.into();
        self.folder = folder.filter(|f| !f.trim().is_empty());
        self
    }

    /// A1 表示法的工作表前綴，名稱含特殊字元時加上引號
    fn sheet_prefix(&self) -> String {
        let plain = self
            .sheet_name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_');
        if plain {
            self.sheet_name.clone()
        } else {
            format!("'{}'", self.sheet_name.replace('\'', "''"))
        }
    }

    fn range(&self, cells: &str) -> String {
        format!("{}!{}", self.sheet_prefix(), cells)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        build_url(
            "google.sheets_api_base",
            &self.api_base,
            &["v4", "spreadsheets"],
            segments,
        )
    }

    fn drive_endpoint(&self, segments: &[&str]) -> Result<Url> {
        build_url(
            "google.drive_api_base",
            &self.drive_api_base,
            &["drive", "v3", "files"],
            segments,
        )
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.auth.access_token(&self.client).await?;
        Ok(request.bearer_auth(token))
    }

    async fn check(response: Response, context: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(FlowError::StoreError {
            message: format!("Sheets API returned {} for {}: {}", status, context, body),
        })
    }

    async fn get_values(&self, document_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.endpoint(&[document_id, "values", range])?;
        tracing::debug!("📡 GET values {}", range);

        let request = self.authorized(self.client.get(url)).await?;
        let response = Self::check(request.send().await?, range).await?;
        let body: ValueRange = response.json().await?;

        Ok(body
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn put_values(&self, document_id: &str, range: &str, values: Value) -> Result<()> {
        let url = self.endpoint(&[document_id, "values", range])?;
        tracing::debug!("📡 PUT values {}", range);

        let request = self
            .authorized(
                self.client
                    .put(url)
                    .query(&[("valueInputOption", "RAW")])
                    .json(&json!({ "values": values })),
            )
            .await?;
        Self::check(request.send().await?, range).await?;
        Ok(())
    }

    async fn find_sheet_id(&self, document_id: &str) -> Result<Option<i64>> {
        let url = self.endpoint(&[document_id])?;
        let request = self
            .authorized(self.client.get(url).query(&[("fields", "sheets.properties")]))
            .await?;
        let response = Self::check(request.send().await?, "spreadsheet metadata").await?;
        let body: Value = response.json().await?;

        Ok(body["sheets"].as_array().and_then(|sheets| {
            sheets
                .iter()
                .map(|sheet| &sheet["properties"])
                .find(|props| props["title"].as_str() == Some(self.sheet_name.as_str()))
                .and_then(|props| props["sheetId"].as_i64())
        }))
    }

    async fn search_files(&self, query: &str, fields: &str) -> Result<Vec<DriveFile>> {
        let url = self.drive_endpoint(&[])?;
        tracing::debug!("📡 Drive search: {}", query);
        let request = self
            .authorized(self.client.get(url).query(&[
                ("q", query),
                ("fields", fields),
                ("orderBy", "name"),
                ("pageSize", "1000"),
            ]))
            .await?;
        let response = Self::check(request.send().await?, "Drive files.list").await?;
        let list: DriveFileList = response.json().await?;
        Ok(list.files)
    }

    async fn find_folder(&self, name: &str) -> Result<Option<String>> {
        let query = format!(
            "mimeType={} and name={} and trashed=false",
            quoted(FOLDER_MIME),
            quoted(name)
        );
        let files = self.search_files(&query, "files(id,name)").await?;
        Ok(files.into_iter().next().map(|f| f.id))
    }

    async fn ensure_folder(&self, name: &str) -> Result<String> {
        if let Some(id) = self.find_folder(name).await? {
            return Ok(id);
        }

        let url = self.drive_endpoint(&[])?;
        let request = self
            .authorized(
                self.client
                    .post(url)
                    .query(&[("fields", "id")])
                    .json(&json!({ "name": name, "mimeType": FOLDER_MIME })),
            )
            .await?;
        let response = Self::check(request.send().await?, "Drive folder create").await?;
        let folder: DriveFile = response.json().await?;
        tracing::info!("📁 Created Drive folder {} ({})", name, folder.id);
        Ok(folder.id)
    }

    /// 把檔案從原本的上層移到 `folder_id`
    async fn move_into(&self, file_id: &str, folder_id: &str) -> Result<()> {
        let url = self.drive_endpoint(&[file_id])?;
        let request = self
            .authorized(self.client.get(url.clone()).query(&[("fields", "id,parents")]))
            .await?;
        let response = Self::check(request.send().await?, "Drive files.get").await?;
        let file: DriveFile = response.json().await?;
        let previous = file.parents.join(",");

        let request = self
            .authorized(self.client.patch(url).json(&json!({})).query(&[
                ("addParents", folder_id),
                ("removeParents", previous.as_str()),
                ("fields", "id,parents"),
            ]))
            .await?;
        Self::check(request.send().await?, "Drive files.update").await?;
        Ok(())
    }
}

fn build_url(field: &str, base: &str, prefix: &[&str], segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| FlowError::InvalidConfigValueError {
        field: field.to_string(),
        value: base.to_string(),
        reason: e.to_string(),
    })?;
    url.path_segments_mut()
        .map_err(|_| FlowError::ConfigError {
            message: format!("{} cannot be a base URL: {}", field, base),
        })?
        .pop_if_empty()
        .extend(prefix)
        .extend(segments);
    Ok(url)
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RowStore for SheetsStore {
    async fn read_row(&self, document_id: &str, row: u32) -> Result<Option<ChapterRow>> {
        let range = self.range(&format!("A{row}:E{row}"));
        let rows = self.get_values(document_id, &range).await?;

        Ok(rows
            .into_iter()
            .next()
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .map(|cells| ChapterRow::from_cells(row, &cells)))
    }

    async fn read_rows(&self, document_id: &str) -> Result<Vec<ChapterRow>> {
        let range = self.range("A:E");
        let rows = self.get_values(document_id, &range).await?;

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
        let range = self.range(&format!("{}{}", column.letter(), row));
        self.put_values(document_id, &range, json!([[value]])).await
    }

    async fn create_document(&self, title: &str) -> Result<String> {
        let url = self.endpoint(&[])?;
        let request = self
            .authorized(self.client.post(url).json(&json!({
                "properties": { "title": title },
                "sheets": [{ "properties": { "title": self.sheet_name } }],
            })))
            .await?;
        let response = Self::check(request.send().await?, "create spreadsheet").await?;
        let created: CreatedSpreadsheet = response.json().await?;

        let headers: Vec<&str> = Column::ALL.iter().map(|c| c.header()).collect();
        self.put_values(&created.spreadsheet_id, &self.range("A1:E1"), json!([headers]))
            .await?;

        tracing::info!("📄 Created spreadsheet {} ({})", created.spreadsheet_id, title);

        if let Some(folder) = &self.folder {
            // 試算表已建立，搬移失敗不影響後續流程
            let placed = match self.ensure_folder(folder).await {
                Ok(folder_id) => self.move_into(&created.spreadsheet_id, &folder_id).await,
                Err(e) => Err(e),
            };
            match placed {
                Ok(()) => tracing::info!("📁 Spreadsheet placed in Drive folder {}", folder),
                Err(e) => tracing::warn!("⚠️ Could not move spreadsheet into {}: {}", folder, e),
            }
        }
        Ok(created.spreadsheet_id)
    }

    /// 有設定資料夾時只列出其中的試算表，否則列出所有 `_Trans` 試算表
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let mut query = format!("mimeType={} and trashed=false", quoted(SPREADSHEET_MIME));
        match &self.folder {
            Some(folder) => match self.find_folder(folder).await? {
                Some(folder_id) => query.push_str(&format!(" and {} in parents", quoted(&folder_id))),
                None => return Ok(Vec::new()),
            },
            None => query.push_str(" and name contains '_Trans'"),
        }

        let files = self
            .search_files(&query, "files(id,name,webViewLink)")
            .await?;
        Ok(files
            .into_iter()
            .map(|f| DocumentSummary {
                id: f.id,
                name: f.name,
                link: f.web_view_link,
            })
            .collect())
    }

    /// A 欄寬 500px 並自動換行
    async fn format_document(&self, document_id: &str) -> Result<()> {
        let sheet_id = match self.find_sheet_id(document_id).await? {
            Some(id) => id,
            None => {
                tracing::warn!("⚠️ Sheet \"{}\" not found, skipping formatting", self.sheet_name);
                return Ok(());
            }
        };

        let url = self.endpoint(&[&format!("{}:batchUpdate", document_id)])?;
        let body = json!({
            "requests": [
                {
                    "updateDimensionProperties": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "COLUMNS",
                            "startIndex": 0,
                            "endIndex": 1
                        },
                        "properties": { "pixelSize": 500 },
                        "fields": "pixelSize"
                    }
                },
                {
                    "repeatCell": {
                        "range": {
                            "sheetId": sheet_id,
                            "startColumnIndex": 0,
                            "endColumnIndex": 1
                        },
                        "cell": { "userEnteredFormat": { "wrapStrategy": "WRAP" } },
                        "fields": "userEnteredFormat.wrapStrategy"
                    }
                }
            ]
        });

        let request = self.authorized(self.client.post(url).json(&body)).await?;
        Self::check(request.send().await?, "batchUpdate").await?;
        tracing::info!("🎨 Sheet formatting applied");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sheets"
    }
}
