//! Captured frame data structures

use image::RgbImage;
use image::imageops::{self, FilterType};

/// Where a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    /// Read from the camera
    Camera,
    /// Produced by the synthetic generator
    Synthetic,
}

/// One video frame ready for encoding
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB pixels at the configured output resolution
    pub image: RgbImage,
    pub origin: FrameOrigin,
    /// Tick counter of the producing loop
    pub tick: u64,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == FrameOrigin::Synthetic
    }
}

/// Scale an image to the output resolution, leaving it untouched if it already matches
pub fn fit_to(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.width() == width && image.height() == height {
        return image;
    }
    imageops::resize(&image, width, height, FilterType::Triangle)
}
