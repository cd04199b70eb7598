//! Video encoder trait abstraction

use bytes::Bytes;
use capture::{FRAME_HEIGHT, FRAME_WIDTH, Frame};

use crate::{DEFAULT_JPEG_QUALITY, EncoderResult};

/// Encoder configuration
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Encoded frame output
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Compressed image bytes
    pub data: Bytes,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame sequence number
    pub sequence: u64,
    /// Tick of the frame this was encoded from
    pub tick: u64,
    /// Encoding took this many microseconds
    pub encode_time_us: u64,
}

/// Video encoder trait
pub trait VideoEncoder: Send {
    /// Encode one frame
    fn encode(&mut self, frame: &Frame) -> EncoderResult<EncodedFrame>;

    /// Get current configuration
    fn config(&self) -> &EncoderConfig;

    /// Get encoder statistics
    fn stats(&self) -> EncoderStats;
}

/// Encoder statistics
#[derive(Debug, Clone, Default)]
pub struct EncoderStats {
    /// Total frames encoded
    pub frames_encoded: u64,
    /// Frames that could not be encoded
    pub failures: u64,
    /// Total bytes output
    pub bytes_output: u64,
    /// Average encoding time in microseconds
    pub avg_encode_time_us: u64,
    /// Average frame size in bytes
    pub avg_frame_size: u64,
}
