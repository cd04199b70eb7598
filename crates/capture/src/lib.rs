//! Frame Capture - camera input with a synthetic fallback for DroneLink
//!
//! The drone's video feed comes from a [`FrameSource`]: frames are read
//! from a camera while it works, and from a deterministic synthetic
//! generator once it is missing or fails.

mod error;
mod frame;
mod glyphs;
mod source;
mod synthetic;
mod traits;

pub use error::*;
pub use frame::*;
pub use source::*;
pub use synthetic::*;
pub use traits::*;

/// Fixed output width of every frame
pub const FRAME_WIDTH: u32 = 640;

/// Fixed output height of every frame
pub const FRAME_HEIGHT: u32 = 360;
