#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod toml_config;

use crate::adapters::openai::{DEFAULT_MODEL, DEFAULT_OPENAI_API};
use crate::adapters::sheets::{
    DEFAULT_DRIVE_API, DEFAULT_DRIVE_FOLDER, DEFAULT_SHEETS_API, DEFAULT_TOKEN_URI,
};
use crate::adapters::telegram::DEFAULT_TELEGRAM_API;
use crate::adapters::{
    CsvStore, DocumentLoader, EchoTransformer, GoogleAuth, LogNotifier, MemoryStore,
    OpenAiTransformer, PromptSettings, SentenceSegmenter, SheetsStore, TelegramNotifier,
};
use crate::core::{IntakeService, ReviewPolicy, WorkflowEngine};
use crate::domain::ports::{Notifier, RowStore, TextTransformer};
use crate::utils::error::{FlowError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_required_field,
    validate_socket_addr, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_SHEET_NAME: &str = "시트1";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub google: GoogleConfig,
    pub ai: AiConfig,
    pub telegram: TelegramConfig,
    pub intake: IntakeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sheets,
    #[default]
    Csv,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sheets" | "google" => Ok(StoreBackend::Sheets),
            "csv" => Ok(StoreBackend::Csv),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(FlowError::InvalidConfigValueError {
                field: "store.backend".to_string(),
                value: other.to_string(),
                reason: "expected 'sheets', 'csv' or 'memory'".to_string(),
            }),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreBackend::Sheets => "sheets",
            StoreBackend::Csv => "csv",
            StoreBackend::Memory => "memory",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// 未指定文件時使用的預設文件 (Sheets 為 spreadsheet ID)
    pub document_id: Option<String>,
    pub csv_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            document_id: None,
            csv_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub sheet_name: String,
    pub client_email: Option<String>,
    pub private_key: Option<String>,
    pub access_token: Option<String>,
    pub token_uri: String,
    pub sheets_api_base: String,
    pub drive_api_base: String,
    /// 專案試算表所在的 Drive 資料夾，空字串表示不搬移
    pub drive_folder: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            client_email: None,
            private_key: None,
            access_token: None,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            sheets_api_base: DEFAULT_SHEETS_API.to_string(),
            drive_api_base: DEFAULT_DRIVE_API.to_string(),
            drive_folder: DEFAULT_DRIVE_FOLDER.to_string(),
        }
    }
}

impl GoogleConfig {
    pub fn has_credentials(&self) -> bool {
        self.access_token.is_some() || (self.client_email.is_some() && self.private_key.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub source_language: String,
    pub target_language: String,
    pub context: String,
    pub translate_temperature: f32,
    pub adapt_temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        let prompts = PromptSettings::default();
        Self {
            api_key: None,
            api_base: DEFAULT_OPENAI_API.to_string(),
            model: DEFAULT_MODEL.to_string(),
            source_language: prompts.source_language,
            target_language: prompts.target_language,
            context: prompts.context,
            translate_temperature: prompts.translate_temperature,
            adapt_temperature: prompts.adapt_temperature,
        }
    }
}

impl AiConfig {
    pub fn prompt_settings(&self) -> PromptSettings {
        PromptSettings {
            model: self.model.clone(),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            context: self.context.clone(),
            translate_temperature: self.translate_temperature,
            adapt_temperature: self.adapt_temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: DEFAULT_TELEGRAM_API.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub review_policy: ReviewPolicy,
    pub docs_base: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            review_policy: ReviewPolicy::default(),
            docs_base: crate::adapters::document::DEFAULT_DOCS_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// 未設定時 serve 使用 json，其他指令使用 compact
    pub format: Option<LogFormat>,
}

impl AppConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        validate_socket_addr("server.bind_addr", &self.server.bind_addr)
    }

    /// 指定的文件，沒有則使用預設文件
    pub fn resolve_document(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| self.store.document_id.clone())
            .ok_or_else(|| FlowError::MissingConfigError {
                field: "store.document_id (SPREADSHEET_ID)".to_string(),
            })
    }

    /// 把空字串視為未設定
    pub(crate) fn normalize(&mut self) {
        for value in [
            &mut self.store.document_id,
            &mut self.google.client_email,
            &mut self.google.private_key,
            &mut self.google.access_token,
            &mut self.ai.api_key,
            &mut self.telegram.bot_token,
            &mut self.telegram.chat_id,
            &mut self.logging.level,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        if let Some(key) = self.google.private_key.take() {
            self.google.private_key = Some(env::clean_private_key(&key));
        }
    }

    pub fn build_store(&self) -> Result<Arc<dyn RowStore>> {
        let store: Arc<dyn RowStore> = match self.store.backend {
            StoreBackend::Sheets => {
                let google = &self.google;
                let auth = match &google.access_token {
                    Some(token) => GoogleAuth::StaticToken(token.clone()),
                    None => GoogleAuth::service_account(
                        validate_required_field("google.client_email", &google.client_email)?,
                        validate_required_field("google.private_key", &google.private_key)?,
                        &google.token_uri,
                    ),
                };
                Arc::new(
                    SheetsStore::with_api_base(auth, &google.sheet_name, &google.sheets_api_base)
                        .with_drive(&google.drive_api_base, Some(google.drive_folder.clone())),
                )
            }
            StoreBackend::Csv => Arc::new(CsvStore::new(&self.store.csv_dir)),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        tracing::debug!("Row store backend: {}", store.backend_name());
        Ok(store)
    }

    pub fn build_transformer(&self) -> Arc<dyn TextTransformer> {
        match &self.ai.api_key {
            Some(key) => Arc::new(OpenAiTransformer::with_api_base(
                key,
                self.ai.prompt_settings(),
                &self.ai.api_base,
            )),
            None => {
                tracing::warn!("⚠️ OpenAI API key not set. Using mock transformations.");
                Arc::new(EchoTransformer)
            }
        }
    }

    pub fn build_notifier(&self) -> Result<Arc<dyn Notifier>> {
        let notifier: Arc<dyn Notifier> = match (&self.telegram.bot_token, &self.telegram.chat_id) {
            (Some(token), Some(chat_id)) => Arc::new(TelegramNotifier::with_api_base(
                token.clone(),
                chat_id.clone(),
                &self.telegram.api_base,
            )?),
            _ => {
                tracing::warn!("⚠️ Telegram credentials not set. Notifications will only be logged.");
                Arc::new(LogNotifier)
            }
        };
        Ok(notifier)
    }

    pub fn document_loader(&self) -> DocumentLoader {
        DocumentLoader::with_docs_base(&self.intake.docs_base)
    }

    /// 共用同一組 store / notifier 建立流程引擎與匯入服務
    pub fn build_services(&self) -> Result<(Arc<WorkflowEngine>, Arc<IntakeService>)> {
        let store = self.build_store()?;
        let notifier = self.build_notifier()?;

        let engine = WorkflowEngine::new(
            Arc::clone(&store),
            self.build_transformer(),
            Arc::clone(&notifier),
        );
        let intake = IntakeService::new(
            store,
            notifier,
            Arc::new(SentenceSegmenter::new()),
            self.intake.review_policy,
        );
        Ok((Arc::new(engine), Arc::new(intake)))
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_socket_addr("server.bind_addr", &self.server.bind_addr)?;

        match self.store.backend {
            StoreBackend::Sheets => {
                if !self.google.has_credentials() {
                    return Err(FlowError::MissingConfigError {
                        field: "google.client_email / google.private_key (or google.access_token)"
                            .to_string(),
                    });
                }
                validate_non_empty_string("google.sheet_name", &self.google.sheet_name)?;
                validate_url("google.token_uri", &self.google.token_uri)?;
                validate_url("google.sheets_api_base", &self.google.sheets_api_base)?;
                validate_url("google.drive_api_base", &self.google.drive_api_base)?;
            }
            StoreBackend::Csv => validate_path("store.csv_dir", &self.store.csv_dir)?,
            StoreBackend::Memory => {}
        }

        validate_url("ai.api_base", &self.ai.api_base)?;
        validate_non_empty_string("ai.model", &self.ai.model)?;
        validate_range("ai.translate_temperature", self.ai.translate_temperature, 0.0, 2.0)?;
        validate_range("ai.adapt_temperature", self.ai.adapt_temperature, 0.0, 2.0)?;

        validate_url("telegram.api_base", &self.telegram.api_base)?;
        if self.telegram.bot_token.is_some() != self.telegram.chat_id.is_some() {
            tracing::warn!("⚠️ Only one of telegram.bot_token / telegram.chat_id is set");
        }

        validate_url("intake.docs_base", &self.intake.docs_base)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.google.sheet_name, "시트1");
        assert_eq!(config.store.backend, StoreBackend::Csv);
        assert_eq!(config.intake.review_policy, ReviewPolicy::All);
    }

    #[test]
    fn test_sheets_backend_requires_credentials() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Sheets;
        assert!(matches!(
            config.validate(),
            Err(FlowError::MissingConfigError { .. })
        ));
        assert!(config.build_store().is_err());

        config.google.access_token = Some("ya29.token".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.build_store().unwrap().backend_name(), "sheets");
    }

    #[test]
    fn test_temperature_out_of_range() {
        let mut config = AppConfig::default();
        config.ai.adapt_temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_document_falls_back_to_default() {
        let mut config = AppConfig::default();
        assert!(config.resolve_document(None).is_err());

        config.store.document_id = Some("sheet-1".to_string());
        assert_eq!(config.resolve_document(None).unwrap(), "sheet-1");
        assert_eq!(config.resolve_document(Some(" other ")).unwrap(), "other");
        assert_eq!(config.resolve_document(Some("")).unwrap(), "sheet-1");
    }

    #[test]
    fn test_missing_keys_select_fallback_adapters() {
        let config = AppConfig::default();
        assert_eq!(config.build_transformer().name(), "echo");
        assert_eq!(config.build_notifier().unwrap().name(), "log");

        let mut config = AppConfig::default();
        config.ai.api_key = Some("sk-test".to_string());
        config.telegram.bot_token = Some("123:abc".to_string());
        config.telegram.chat_id = Some("1001".to_string());
        assert_eq!(config.build_transformer().name(), "openai");
        assert_eq!(config.build_notifier().unwrap().name(), "telegram");
    }

    #[test]
    fn test_normalize_blank_values() {
        let mut config = AppConfig::default();
        config.ai.api_key = Some("  ".to_string());
        config.google.private_key = Some("\"-----BEGIN KEY-----\\nabc\\n-----END KEY-----\"".to_string());
        config.normalize();

        assert!(config.ai.api_key.is_none());
        assert_eq!(
            config.google.private_key.as_deref(),
            Some("-----BEGIN KEY-----\nabc\n-----END KEY-----")
        );
    }
}
