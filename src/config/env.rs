use super::{AppConfig, StoreBackend};
use crate::utils::error::Result;

impl AppConfig {
    /// 從環境變數建立設定 (`.env` 由呼叫端先以 dotenvy 載入)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let mut config = AppConfig::default();

        if let Some(addr) = get("BIND_ADDR") {
            config.server.bind_addr = addr;
        }

        config.store.document_id = get("SPREADSHEET_ID");
        if let Some(dir) = get("CSV_DIR") {
            config.store.csv_dir = dir;
        }

        if let Some(name) = get("SHEET_NAME") {
            config.google.sheet_name = name;
        }
        config.google.client_email = get("GOOGLE_CLIENT_EMAIL");
        config.google.private_key = get("GOOGLE_PRIVATE_KEY");
        config.google.access_token = get("GOOGLE_ACCESS_TOKEN");
        if let Some(folder) = get("DRIVE_FOLDER") {
            config.google.drive_folder = folder;
        }

        config.ai.api_key = get("OPENAI_API_KEY");
        if let Some(model) = get("OPENAI_MODEL") {
            config.ai.model = model;
        }

        config.telegram.bot_token = get("TELEGRAM_BOT_TOKEN");
        config.telegram.chat_id = get("TELEGRAM_CHAT_ID");

        if let Some(policy) = get("REVIEW_POLICY") {
            config.intake.review_policy = policy.parse()?;
        }
        config.logging.level = get("LOG_LEVEL");

        // 未指定時：有 Google 憑證就用 Sheets，否則用本機 CSV
        config.store.backend = match get("STORE_BACKEND") {
            Some(backend) => backend.parse()?,
            None if config.google.has_credentials() => StoreBackend::Sheets,
            None => StoreBackend::Csv,
        };

        config.normalize();
        Ok(config)
    }
}

/// 清理從環境變數或 JSON 複製來的 PEM 私鑰
pub fn clean_private_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(trimmed);
    unquoted.replace("\\n", "\n")
}
