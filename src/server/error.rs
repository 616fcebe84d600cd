//! Maps crate errors to JSON-RPC error codes.

use crate::utils::error::IngestError;
use jsonrpsee::types::ErrorObjectOwned;

pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const UNAVAILABLE: i32 = 4003;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const FETCH_ERROR: i32 = 5001;
    pub const SYSTEM_ERROR: i32 = 5002;
}

pub fn to_rpc_error(err: IngestError) -> ErrorObjectOwned {
    let code = match &err {
        IngestError::ValidationError { .. }
        | IngestError::InvalidConfigValueError { .. }
        | IngestError::UnsupportedFormat { .. }
        | IngestError::CsvError(_)
        | IngestError::ZipError(_) => code::VALIDATION_ERROR,
        IngestError::NotFound { .. } => code::NOT_FOUND,
        IngestError::QueueClosed | IngestError::QueueFull => code::UNAVAILABLE,
        IngestError::HttpError(_) => code::FETCH_ERROR,
        IngestError::IoError(_) => code::SYSTEM_ERROR,
        IngestError::SerializationError(_)
        | IngestError::ConfigError { .. }
        | IngestError::ConfigValidationError { .. }
        | IngestError::MissingConfigError { .. }
        | IngestError::ProcessingError { .. }
        | IngestError::ServerError { .. } => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}
