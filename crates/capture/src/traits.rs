//! Camera collaborator abstraction

use image::RgbImage;

use crate::{CaptureResult, FRAME_HEIGHT, FRAME_WIDTH};

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Output frame width
    pub width: u32,
    /// Output frame height
    pub height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
        }
    }
}

/// Opens camera devices
///
/// Driver selection lives behind this trait; the streaming side only asks
/// for a device once per session.
pub trait CaptureProvider: Send {
    /// Open a device, or `None` when no camera is available
    fn open(&mut self) -> Option<Box<dyn CaptureDevice>>;
}

/// An opened camera
pub trait CaptureDevice: Send {
    /// Read one frame (blocking)
    fn read(&mut self) -> CaptureResult<RgbImage>;

    /// Give the device back to the system
    fn release(&mut self) {}
}

/// Provider for hosts without a camera; every session runs synthetic
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCamera;

impl CaptureProvider for NoCamera {
    fn open(&mut self) -> Option<Box<dyn CaptureDevice>> {
        None
    }
}

impl<F> CaptureProvider for F
where
    F: FnMut() -> Option<Box<dyn CaptureDevice>> + Send,
{
    fn open(&mut self) -> Option<Box<dyn CaptureDevice>> {
        self()
    }
}

/// Capture statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames read from the camera
    pub camera_frames: u64,
    /// Frames produced by the synthetic generator
    pub synthetic_frames: u64,
    /// Failed camera reads (at most one per session)
    pub read_failures: u64,
}
