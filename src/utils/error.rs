use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Credential signing failed: {0}")]
    AuthError(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid callback data '{data}': {reason}")]
    InvalidCallback { data: String, reason: String },

    #[error("Callback token is {len} bytes, limit is {limit}")]
    TokenTooLong { len: usize, limit: usize },

    #[error("Row {row} of document {document} has no {column} text")]
    MissingContent {
        document: String,
        row: u32,
        column: String,
    },

    #[error("Row store error: {message}")]
    StoreError { message: String },

    #[error("Text transformation failed during {stage}: {details}")]
    TransformationError { stage: String, details: String },

    #[error("Notification failed: {message}")]
    NotifyError { message: String },

    #[error("Unsupported document: {name}")]
    UnsupportedDocument { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Configuration,
    Protocol,
    Processing,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FlowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::ApiError(_) | FlowError::NotifyError { .. } => ErrorCategory::Network,
            FlowError::CsvError(_)
            | FlowError::IoError(_)
            | FlowError::StoreError { .. }
            | FlowError::MissingContent { .. } => ErrorCategory::Storage,
            FlowError::AuthError(_)
            | FlowError::ConfigError { .. }
            | FlowError::MissingConfigError { .. }
            | FlowError::InvalidConfigValueError { .. }
            | FlowError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            FlowError::InvalidCallback { .. } | FlowError::TokenTooLong { .. } => {
                ErrorCategory::Protocol
            }
            FlowError::SerializationError(_) | FlowError::TransformationError { .. } => {
                ErrorCategory::Processing
            }
            FlowError::ZipError(_) | FlowError::UnsupportedDocument { .. } => ErrorCategory::Input,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 過期或重複的按鈕點擊不影響其他章節
            ErrorCategory::Protocol => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Processing | ErrorCategory::Input | ErrorCategory::Storage => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 可以重新投遞的錯誤 (webhook 回傳 5xx 讓平台重送)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Storage | ErrorCategory::Processing
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            FlowError::ApiError(_) => "Check network connectivity and the remote API status, then retry",
            FlowError::NotifyError { .. } => "Verify TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID",
            FlowError::AuthError(_) => "Verify GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY (PEM format)",
            FlowError::MissingConfigError { .. } => "Set the missing value in the config file or environment",
            FlowError::ConfigError { .. }
            | FlowError::InvalidConfigValueError { .. }
            | FlowError::ConfigValidationError { .. } => "Fix the configuration file and restart",
            FlowError::InvalidCallback { .. } | FlowError::TokenTooLong { .. } => {
                "Resend the review request; the button payload is not recognised"
            }
            FlowError::MissingContent { .. } => "Fill in the missing column in the sheet and resend the review",
            FlowError::StoreError { .. } | FlowError::CsvError(_) | FlowError::IoError(_) => {
                "Check that the document exists and the credentials can write to it"
            }
            FlowError::TransformationError { .. } => "Check OPENAI_API_KEY and model availability, then retry",
            FlowError::SerializationError(_) => "The remote API returned an unexpected payload",
            FlowError::ZipError(_) | FlowError::UnsupportedDocument { .. } => {
                "Provide a .txt or .docx file, or a Google Docs URL"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach an external service: {}", self),
            ErrorCategory::Storage => format!("Could not read or write the document: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Protocol => format!("Unrecognised approval action: {}", self),
            ErrorCategory::Processing => format!("Processing failed: {}", self),
            ErrorCategory::Input => format!("Cannot read the input document: {}", self),
        }
    }
}

impl From<toml::de::Error> for FlowError {
    fn from(e: toml::de::Error) -> Self {
        FlowError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
