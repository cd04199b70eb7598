//! Video Encoder - JPEG frame encoding for DroneLink
//!
//! Each frame is compressed independently, so the viewer can decode any
//! frame it receives without reference to earlier ones.

mod error;
mod jpeg;
mod traits;

pub use error::*;
pub use jpeg::*;
pub use traits::*;

/// Default JPEG quality (1-100)
pub const DEFAULT_JPEG_QUALITY: u8 = 70;
