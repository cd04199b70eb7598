//! Encoder error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported resolution: {width}x{height}")]
    UnsupportedResolution { width: u32, height: u32 },
}

pub type EncoderResult<T> = Result<T, EncoderError>;
