//! Error types for the protocol

use thiserror::Error;

/// Protocol error
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Telemetry line is not valid UTF-8")]
    InvalidUtf8,

    #[error("Telemetry payload contains an embedded newline")]
    EmbeddedNewline,

    #[error("Telemetry line too long: {size} bytes without delimiter (max: {max})")]
    LineTooLong { size: usize, max: usize },

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
