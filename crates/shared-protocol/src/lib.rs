//! Shared Protocol Definitions for DroneLink
//!
//! This crate contains the wire formats and message types shared by the
//! drone and the ground station:
//! - Telemetry: newline-delimited JSON objects
//! - Video: 4-byte big-endian length prefix followed by a JPEG payload

mod error;
mod framing;
mod line;
mod telemetry;

pub use error::*;
pub use framing::*;
pub use line::*;
pub use telemetry::*;

/// Length of the video frame length prefix in bytes
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest video frame payload accepted on the wire (16 MiB)
///
/// A 640x360 JPEG is a few tens of kilobytes; anything near this limit
/// indicates a corrupt or hostile length prefix.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Largest telemetry line buffered while waiting for a newline (64 KiB)
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Telemetry line delimiter
pub const LINE_DELIMITER: u8 = b'\n';
