use super::AppConfig;
use crate::utils::error::{FlowError, Result};
use regex::{Captures, Regex};
use std::path::Path;

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| FlowError::ConfigError {
            message: format!("Cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content, |name| std::env::var(name).ok())?;
        let mut config: AppConfig = toml::from_str(&processed)?;
        config.normalize();
        Ok(config)
    }
}

/// 替換 `${VAR}`；未設定的變數替換為空字串，之後視為未設定
pub(crate) fn substitute_env_vars<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| FlowError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &Captures| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| {
            tracing::debug!("Environment variable {} not set", name);
            String::new()
        })
    });

    Ok(result.into_owned())
}
