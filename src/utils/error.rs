use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Unsupported document format: {file_name}")]
    UnsupportedFormat { file_name: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Processing queue is closed")]
    QueueClosed,

    #[error("Processing queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    System,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IngestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::HttpError(_) => ErrorCategory::Network,
            IngestError::ZipError(_)
            | IngestError::CsvError(_)
            | IngestError::SerializationError(_)
            | IngestError::ProcessingError { .. }
            | IngestError::UnsupportedFormat { .. } => ErrorCategory::Data,
            IngestError::ConfigError { .. }
            | IngestError::ConfigValidationError { .. }
            | IngestError::InvalidConfigValueError { .. }
            | IngestError::MissingConfigError { .. } => ErrorCategory::Configuration,
            IngestError::IoError(_)
            | IngestError::ServerError { .. }
            | IngestError::QueueClosed
            | IngestError::QueueFull => ErrorCategory::System,
            IngestError::ValidationError { .. } | IngestError::NotFound { .. } => {
                ErrorCategory::Validation
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            IngestError::NotFound { .. } => ErrorSeverity::Low,
            IngestError::HttpError(_) | IngestError::QueueClosed | IngestError::QueueFull => {
                ErrorSeverity::Medium
            }
            IngestError::ZipError(_)
            | IngestError::CsvError(_)
            | IngestError::SerializationError(_)
            | IngestError::ProcessingError { .. }
            | IngestError::ValidationError { .. }
            | IngestError::UnsupportedFormat { .. }
            | IngestError::ConfigError { .. }
            | IngestError::ConfigValidationError { .. }
            | IngestError::InvalidConfigValueError { .. }
            | IngestError::MissingConfigError { .. } => ErrorSeverity::High,
            IngestError::IoError(_) | IngestError::ServerError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            IngestError::HttpError(_) => {
                "Check that the document URL is reachable and try the upload again".to_string()
            }
            IngestError::ZipError(_) => {
                "Make sure the bundle is a valid ZIP archive of CSV/TSV tables".to_string()
            }
            IngestError::CsvError(_) => {
                "Check the delimiter and quoting of the uploaded table file".to_string()
            }
            IngestError::UnsupportedFormat { .. } => {
                "Export the document tables as .csv, .tsv or a .zip of those files".to_string()
            }
            IngestError::IoError(_) => {
                "Check that the data directory exists and is writable".to_string()
            }
            IngestError::ConfigError { .. }
            | IngestError::ConfigValidationError { .. }
            | IngestError::InvalidConfigValueError { .. }
            | IngestError::MissingConfigError { .. } => {
                "Review the configuration file and command line flags".to_string()
            }
            IngestError::ServerError { .. } => {
                "Make sure the port is free and the host address is valid".to_string()
            }
            IngestError::QueueClosed => "Restart the server to restore the worker pool".to_string(),
            IngestError::QueueFull => {
                "Wait for queued documents to finish, or raise workers.queue_capacity".to_string()
            }
            IngestError::NotFound { .. } => "Check the requested id".to_string(),
            IngestError::SerializationError(_)
            | IngestError::ProcessingError { .. }
            | IngestError::ValidationError { .. } => {
                "Inspect the input data and the server logs".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Data => format!("Could not read the document: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
            ErrorCategory::Validation => format!("Invalid request: {}", self),
        }
    }

    /// 依嚴重程度決定程式退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
