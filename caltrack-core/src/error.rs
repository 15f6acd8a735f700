//! Error types for the caltrack engine.

use thiserror::Error;

/// Errors that can occur in caltrack operations.
///
/// Events that cannot be planned (no task id, bad times, ...) are not errors;
/// they end up in the plan's `unmatched` list instead.
#[derive(Error, Debug)]
pub enum CalTrackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Record lookup failed: {0}")]
    Lookup(String),

    #[error("Subject transform failed: {0}")]
    Transform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CalTrackError {
    fn from(e: serde_json::Error) -> Self {
        CalTrackError::Serialization(e.to_string())
    }
}

/// Result type alias for caltrack operations.
pub type CalTrackResult<T> = Result<T, CalTrackError>;
