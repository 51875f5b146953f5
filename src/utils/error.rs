use std::fmt;
use thiserror::Error;

/// 遠端呼叫所屬的步驟
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Tokenize,
    Charge,
    Confirm,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Tokenize => "tokenize",
            Stage::Charge => "charge",
            Stage::Confirm => "confirm",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 批次檔格式錯誤，會中止整個解析
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("malformed input at line {line}: expected 6 fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("invalid {field} at line {line}: {value:?}")]
    FieldType {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("unreadable input at line {line}: {message}")]
    Unreadable { line: usize, message: String },
}

impl FormatError {
    pub fn stage(&self) -> &'static str {
        match self {
            FormatError::FieldCount { .. } => "field-count",
            FormatError::FieldType { .. } => "field-type",
            FormatError::Unreadable { .. } => "unreadable",
        }
    }

    pub fn line(&self) -> usize {
        match self {
            FormatError::FieldCount { line, .. }
            | FormatError::FieldType { line, .. }
            | FormatError::Unreadable { line, .. } => *line,
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayErrorKind {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status code {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// 單筆記錄的遠端呼叫失敗，只影響該筆記錄
#[derive(Error, Debug)]
#[error("{stage} failed: {kind}")]
pub struct GatewayError {
    pub stage: Stage,
    pub kind: GatewayErrorKind,
}

impl GatewayError {
    pub fn new(stage: Stage, kind: impl Into<GatewayErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    pub fn status(stage: Stage, status: u16, body: impl Into<String>) -> Self {
        Self::new(
            stage,
            GatewayErrorKind::Status {
                status,
                body: body.into(),
            },
        )
    }

    pub fn decode(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, GatewayErrorKind::Decode(message.into()))
    }
}

#[derive(Error, Debug)]
pub enum DonateError {
    #[error("Input format error: {source}")]
    Format {
        #[from]
        source: FormatError,
    },

    #[error("Input decode error: {message}")]
    Decode { message: String },

    #[error("API client error: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Network,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DonateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DonateError::Format { .. } | DonateError::Decode { .. } => ErrorCategory::Input,
            DonateError::ApiError(_) => ErrorCategory::Network,
            DonateError::ConfigError { .. }
            | DonateError::ConfigValidationError { .. }
            | DonateError::InvalidConfigValueError { .. }
            | DonateError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DonateError::IoError(_) | DonateError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            DonateError::Format { source } => format!(
                "Fix line {} of the input file; no donation has been charged",
                source.line()
            ),
            DonateError::Decode { .. } => {
                "Check that the input file is rot-encoded and that --shift-offset matches".to_string()
            }
            DonateError::ApiError(_) => {
                "Check network access and the configured gateway endpoints".to_string()
            }
            DonateError::IoError(_) => "Check that the input file exists and is readable".to_string(),
            DonateError::SerializationError(_) => "Re-run without --json".to_string(),
            DonateError::MissingConfigError { field } => {
                format!("Provide '{}' via the command line, environment or config file", field)
            }
            DonateError::ConfigError { .. }
            | DonateError::ConfigValidationError { .. }
            | DonateError::InvalidConfigValueError { .. } => {
                "Review the configuration file and command-line flags".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DonateError::Format { source } => format!("輸入檔格式錯誤: {}", source),
            DonateError::Decode { message } => format!("無法解碼輸入檔: {}", message),
            DonateError::IoError(e) => format!("檔案讀取失敗: {}", e),
            DonateError::MissingConfigError { field } => format!("缺少必要設定: {}", field),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DonateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_stage_and_line() {
        let err = FormatError::FieldCount { line: 3, found: 5 };
        assert_eq!(err.stage(), "field-count");
        assert_eq!(err.line(), 3);

        let err = FormatError::FieldType {
            line: 2,
            field: "amount",
            value: "abc".to_string(),
        };
        assert_eq!(err.stage(), "field-type");
        assert_eq!(err.to_string(), "invalid amount at line 2: \"abc\"");
    }

    #[test]
    fn test_severity_mapping() {
        let err: DonateError = FormatError::FieldCount { line: 1, found: 2 }.into();
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.recovery_suggestion().contains("line 1"));

        let err = DonateError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::status(Stage::Charge, 402, "insufficient funds");
        assert_eq!(
            err.to_string(),
            "charge failed: unexpected status code 402: insufficient funds"
        );
    }
}
