use crate::utils::error::{FlowError, Result};
use std::net::SocketAddr;
use url::Url;

/// 啟動前檢查設定是否可用
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> FlowError {
    FlowError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// API base URL 只接受 http / https
pub fn validate_url(field: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw).map_err(|e| invalid(field, raw, format!("not a URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(field, raw, format!("scheme must be http or https, got {}", other))),
    }
}

pub fn validate_path(field: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field, path, "path is empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field, path.escape_default(), "path contains a NUL byte"));
    }
    Ok(())
}

pub fn validate_socket_addr(field: &str, addr: &str) -> Result<SocketAddr> {
    addr.parse::<SocketAddr>()
        .map_err(|e| invalid(field, addr, format!("expected host:port ({})", e)))
}

/// 選用欄位在特定後端下變成必填
pub fn validate_required_field<'a, T>(field: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| FlowError::MissingConfigError {
        field: field.to_string(),
    })
}

pub fn validate_non_empty_string(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(invalid(field, value, "must not be blank"))
    } else {
        Ok(())
    }
}

pub fn validate_range<T>(field: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, value, format!("expected {} to {}", min, max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_urls() {
        assert!(validate_url("ai.api_base", "https://api.openai.com/v1").is_ok());
        assert!(validate_url("telegram.api_base", "http://127.0.0.1:8081").is_ok());
        assert!(validate_url("telegram.api_base", "").is_err());
        assert!(validate_url("google.token_uri", "oauth2.googleapis.com/token").is_err());

        let err = validate_url("intake.docs_base", "ftp://docs.example.com").unwrap_err();
        assert!(err.to_string().contains("intake.docs_base"));
    }

    #[test]
    fn test_csv_dir_path() {
        assert!(validate_path("store.csv_dir", "./data").is_ok());
        assert!(validate_path("store.csv_dir", "  ").is_err());
        assert!(validate_path("store.csv_dir", "data\0x").is_err());
    }

    #[test]
    fn test_bind_addr() {
        assert_eq!(
            validate_socket_addr("server.bind_addr", "0.0.0.0:3000").unwrap().port(),
            3000
        );
        assert!(validate_socket_addr("server.bind_addr", "localhost").is_err());
    }

    #[test]
    fn test_temperature_range() {
        assert!(validate_range("ai.translate_temperature", 0.3, 0.0, 2.0).is_ok());
        assert!(validate_range("ai.adapt_temperature", 2.0, 0.0, 2.0).is_ok());
        assert!(validate_range("ai.adapt_temperature", -0.1, 0.0, 2.0).is_err());
    }

    #[test]
    fn test_credentials_required_for_sheets() {
        let token = Some("ya29.token".to_string());
        let missing: Option<String> = None;
        assert_eq!(validate_required_field("google.access_token", &token).unwrap(), "ya29.token");
        assert!(matches!(
            validate_required_field("google.client_email", &missing),
            Err(FlowError::MissingConfigError { .. })
        ));
        assert!(validate_non_empty_string("google.sheet_name", "\t").is_err());
    }
}
