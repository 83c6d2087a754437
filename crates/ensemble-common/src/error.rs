//! Error types for the ensemble forecaster.

use thiserror::Error;

/// Result type alias using EnsembleError.
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Primary error type for ensemble operations.
#[derive(Debug, Error)]
pub enum EnsembleError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    // === Data Errors ===
    #[error("No data available for {0}")]
    NoData(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Script block not found in page")]
    ScriptNotFound,

    #[error("Variable '{0}' not found in script")]
    VariableNotFound(String),

    #[error("Failed to parse ensemble payload: {0}")]
    ParseError(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    // === Storage Errors ===
    #[error("Cache error: {0}")]
    CacheError(String),

    // === Rendering Errors ===
    #[error("Rendering failed: {0}")]
    RenderError(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl EnsembleError {
    /// True for the "nothing to show for this case" failure that callers
    /// report as a warning instead of propagating.
    pub fn is_precondition(&self) -> bool {
        matches!(self, EnsembleError::NoData(_))
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            EnsembleError::MissingParameter(_)
            | EnsembleError::InvalidParameter { .. }
            | EnsembleError::UnknownVariable(_)
            | EnsembleError::UnknownModel(_)
            | EnsembleError::UnknownLocation(_) => 400,

            EnsembleError::NoData(_) => 404,

            EnsembleError::Upstream(_)
            | EnsembleError::ScriptNotFound
            | EnsembleError::VariableNotFound(_)
            | EnsembleError::ParseError(_)
            | EnsembleError::ShapeMismatch(_) => 502,

            _ => 500,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for EnsembleError {
    fn from(err: std::io::Error) -> Self {
        EnsembleError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for EnsembleError {
    fn from(err: serde_json::Error) -> Self {
        EnsembleError::ParseError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_no_data_is_precondition() {
        assert!(EnsembleError::NoData("munich:temperature:rapid_id2".into()).is_precondition());
        assert!(!EnsembleError::ScriptNotFound.is_precondition());
        assert!(!EnsembleError::Upstream("timeout".into()).is_precondition());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(EnsembleError::UnknownVariable("snow".into()).http_status_code(), 400);
        assert_eq!(EnsembleError::NoData("x".into()).http_status_code(), 404);
        assert_eq!(EnsembleError::ParseError("x".into()).http_status_code(), 502);
        assert_eq!(EnsembleError::CacheError("x".into()).http_status_code(), 500);
    }
}
