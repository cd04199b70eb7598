//! Transport error types

use encoder::EncoderError;
use thiserror::Error;

/// Errors that end a channel unit before or outside a session
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Accept error: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Connection to {addr} failed: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to {addr} timed out")]
    ConnectTimeout { addr: String },

    #[error("Capture worker failed: {0}")]
    Worker(String),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
