use thiserror::Error;

/// Pothole detector error types
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Location permission not granted")]
    MissingPermission,

    #[error("No authenticated user identity")]
    MissingIdentity,

    #[error("Detection is not active")]
    NotActive,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by an [`EventSink`](crate::sink::EventSink)
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Event receiver disconnected")]
    Disconnected,

    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event rejected: {0}")]
    Rejected(String),
}

/// Result type for detector operations
pub type DResult<T> = Result<T, DetectorError>;
