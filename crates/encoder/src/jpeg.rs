//! JPEG encoder implementation

use std::time::Instant;

use bytes::Bytes;
use capture::Frame;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::{ImageFormat, RgbImage};
use tracing::{debug, info};

use crate::{EncodedFrame, EncoderConfig, EncoderError, EncoderResult, EncoderStats, VideoEncoder};

/// Number of recent encode times kept for the running average
const ENCODE_TIME_WINDOW: usize = 100;

/// Software JPEG encoder
pub struct JpegEncoder {
    config: EncoderConfig,
    stats: EncoderStats,
    frame_counter: u64,
    encode_times: Vec<u64>,
}

impl JpegEncoder {
    /// Create a new JPEG encoder
    pub fn new(config: EncoderConfig) -> EncoderResult<Self> {
        if !(1..=100).contains(&config.quality) {
            return Err(EncoderError::InvalidConfig(format!(
                "JPEG quality must be 1-100, got {}",
                config.quality
            )));
        }
        if config.width == 0 || config.height == 0 {
            return Err(EncoderError::UnsupportedResolution {
                width: config.width,
                height: config.height,
            });
        }

        info!(
            "Initializing JPEG encoder: {}x{} @ quality {}",
            config.width, config.height, config.quality
        );

        Ok(Self {
            config,
            stats: EncoderStats::default(),
            frame_counter: 0,
            encode_times: Vec::with_capacity(ENCODE_TIME_WINDOW),
        })
    }

    /// Count a frame that was dropped before or during encoding
    pub fn record_failure(&mut self) {
        self.stats.failures += 1;
    }

    fn compress(&self, image: &RgbImage) -> EncoderResult<Vec<u8>> {
        let mut data = Vec::with_capacity(image.as_raw().len() / 8);
        ImageJpegEncoder::new_with_quality(&mut data, self.config.quality)
            .encode_image(image)
            .map_err(|e| EncoderError::EncodingFailed(e.to_string()))?;
        Ok(data)
    }
}

impl VideoEncoder for JpegEncoder {
    fn encode(&mut self, frame: &Frame) -> EncoderResult<EncodedFrame> {
        if frame.width() != self.config.width || frame.height() != self.config.height {
            self.record_failure();
            return Err(EncoderError::UnsupportedResolution {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let start = Instant::now();
        let data = match self.compress(&frame.image) {
            Ok(data) => data,
            Err(e) => {
                self.record_failure();
                return Err(e);
            }
        };
        let encode_time = start.elapsed().as_micros() as u64;

        let encoded = EncodedFrame {
            data: Bytes::from(data),
            width: frame.width(),
            height: frame.height(),
            sequence: self.frame_counter,
            tick: frame.tick,
            encode_time_us: encode_time,
        };

        self.frame_counter += 1;
        self.stats.frames_encoded += 1;
        self.stats.bytes_output += encoded.data.len() as u64;

        self.encode_times.push(encode_time);
        if self.encode_times.len() > ENCODE_TIME_WINDOW {
            self.encode_times.remove(0);
        }
        self.stats.avg_encode_time_us =
            self.encode_times.iter().sum::<u64>() / self.encode_times.len() as u64;
        self.stats.avg_frame_size = self.stats.bytes_output / self.stats.frames_encoded;

        debug!(
            sequence = encoded.sequence,
            bytes = encoded.data.len(),
            "Encoded frame"
        );

        Ok(encoded)
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn stats(&self) -> EncoderStats {
        self.stats.clone()
    }
}

/// Decode a JPEG payload into RGB pixels
pub fn decode_jpeg(data: &[u8]) -> EncoderResult<RgbImage> {
    let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|e| EncoderError::DecodingFailed(e.to_string()))?;
    Ok(image.to_rgb8())
}
