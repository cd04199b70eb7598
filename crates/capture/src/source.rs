//! Frame source with one-way camera → synthetic fallback

use chrono::NaiveTime;
use tracing::{debug, info, warn};

use crate::{
    CaptureConfig, CaptureDevice, CaptureError, CaptureProvider, CaptureResult, CaptureStats,
    Frame, FrameOrigin, fit_to, synthetic_frame,
};

/// Capture mode of a frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Reading frames from the camera
    Real,
    /// Generating frames; terminal for the session
    Synthetic,
}

impl CaptureMode {
    /// Apply a mode change; the only allowed edge is `Real -> Synthetic`
    pub fn transition(&mut self, to: CaptureMode) -> CaptureResult<()> {
        match (*self, to) {
            (CaptureMode::Real, CaptureMode::Synthetic) => {
                *self = to;
                Ok(())
            }
            (from, to) => Err(CaptureError::InvalidTransition { from, to }),
        }
    }
}

/// Produces one frame per tick for the video channel
///
/// Starts in [`CaptureMode::Real`] when the provider opens a camera. The
/// first failed read releases the camera and switches to
/// [`CaptureMode::Synthetic`] for the rest of the session.
pub struct FrameSource {
    device: Option<Box<dyn CaptureDevice>>,
    mode: CaptureMode,
    config: CaptureConfig,
    stats: CaptureStats,
}

impl FrameSource {
    /// Open the camera through the provider, falling back to synthetic frames
    pub fn open(provider: &mut dyn CaptureProvider, config: CaptureConfig) -> Self {
        match provider.open() {
            Some(device) => {
                info!("Camera opened, capturing real frames");
                Self {
                    device: Some(device),
                    mode: CaptureMode::Real,
                    config,
                    stats: CaptureStats::default(),
                }
            }
            None => {
                info!("No camera available, using synthetic frames");
                Self::synthetic(config)
            }
        }
    }

    /// Source that only ever generates synthetic frames
    pub fn synthetic(config: CaptureConfig) -> Self {
        Self {
            device: None,
            mode: CaptureMode::Synthetic,
            config,
            stats: CaptureStats::default(),
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats.clone()
    }

    /// Produce the frame for `tick`
    ///
    /// Never fails: a failed camera read yields the synthetic frame for the
    /// same tick.
    pub fn next_frame(&mut self, tick: u64, clock: NaiveTime) -> Frame {
        if self.mode == CaptureMode::Real {
            match self.read_camera() {
                Ok(image) => {
                    self.stats.camera_frames += 1;
                    return Frame {
                        image: fit_to(image, self.config.width, self.config.height),
                        origin: FrameOrigin::Camera,
                        tick,
                    };
                }
                Err(e) => {
                    warn!(tick, "Camera read failed, switching to synthetic frames: {}", e);
                    self.stats.read_failures += 1;
                    self.fall_back();
                }
            }
        }

        self.stats.synthetic_frames += 1;
        Frame {
            image: synthetic_frame(self.config.width, self.config.height, tick, clock),
            origin: FrameOrigin::Synthetic,
            tick,
        }
    }

    fn read_camera(&mut self) -> CaptureResult<image::RgbImage> {
        self.device
            .as_mut()
            .ok_or(CaptureError::Disconnected)?
            .read()
    }

    fn fall_back(&mut self) {
        self.release();
        if let Err(e) = self.mode.transition(CaptureMode::Synthetic) {
            debug!("Capture mode unchanged: {}", e);
        }
    }

    fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            debug!("Camera released");
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}
