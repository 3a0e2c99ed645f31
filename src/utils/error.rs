use thiserror::Error;

/// A single raw record that could not be projected into an export row.
///
/// These never abort a page: the exporter drops the record and logs a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing field `{field}`")]
    MissingField { field: String },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl RecordError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned HTTP {status} for {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("Malformed API response: {message}")]
    MalformedResponse { message: String },

    #[cfg(feature = "activity")]
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Transport,
    Record,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_)
            | EtlError::HttpStatusError { .. }
            | EtlError::MalformedResponse { .. } => ErrorCategory::Transport,
            #[cfg(feature = "activity")]
            EtlError::DatabaseError(_) => ErrorCategory::Transport,
            EtlError::CsvError(_) | EtlError::IoError(_) | EtlError::SerializationError(_) => {
                ErrorCategory::Io
            }
            EtlError::RecordError(_) => ErrorCategory::Record,
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Config,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Record => ErrorSeverity::Low,
            // Re-running the same export resumes from the last good page.
            ErrorCategory::Transport => ErrorSeverity::Medium,
            ErrorCategory::Io => ErrorSeverity::High,
            ErrorCategory::Config => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::HttpStatusError { status: 401, .. }
            | EtlError::HttpStatusError { status: 403, .. } => {
                "Check CONSUMER_KEY and CONSUMER_SECRET for this website".to_string()
            }
            EtlError::HttpStatusError { status: 404, .. } => {
                "Check SITE_URL and that the WooCommerce REST API is enabled".to_string()
            }
            EtlError::MissingConfigError { field } => {
                format!("Set {} in the config file or the environment (.env)", field)
            }
            _ => match self.category() {
                ErrorCategory::Transport => {
                    "Run the same export again; it resumes from the last saved page".to_string()
                }
                ErrorCategory::Io => {
                    "Check that the data directory exists and is writable".to_string()
                }
                ErrorCategory::Config => {
                    "Fix the configuration file or environment variables and retry".to_string()
                }
                ErrorCategory::Record => "The record was skipped; no action needed".to_string(),
            },
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Transport => format!("Could not fetch data: {}", self),
            ErrorCategory::Io => format!("Could not save export progress: {}", self),
            ErrorCategory::Config => format!("Invalid configuration: {}", self),
            ErrorCategory::Record => format!("Skipped a record: {}", self),
        }
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
