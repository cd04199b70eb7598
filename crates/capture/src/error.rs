//! Capture error types

use thiserror::Error;

use crate::CaptureMode;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),

    #[error("Camera disconnected")]
    Disconnected,

    #[error("Invalid capture mode transition: {from:?} -> {to:?}")]
    InvalidTransition { from: CaptureMode, to: CaptureMode },
}

pub type CaptureResult<T> = Result<T, CaptureError>;
