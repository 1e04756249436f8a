//! Error types for the relay core.
//!
//! Every variant is scoped to a single call. Nothing here is fatal to the
//! process: the relay loop logs the error and tears the call down.

use thiserror::Error;

/// Errors that can occur while bridging a call.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection to the realtime provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Frame could not be serialized or parsed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Metrics recorder could not be built
    #[error("Metrics error: {0}")]
    MetricsError(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::SerializationError(err.to_string())
    }
}
