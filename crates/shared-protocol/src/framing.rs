//! Length-prefixed framing for the video channel
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (Length bytes)   │
//! │ Big-endian u32   │ JPEG image               │
//! └──────────────────┴──────────────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{FRAME_HEADER_LEN, MAX_FRAME_LEN, ProtocolError, ProtocolResult};

/// Build the 4-byte length prefix for a payload
pub fn encode_frame_header(payload_len: usize) -> ProtocolResult<[u8; FRAME_HEADER_LEN]> {
    if payload_len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            size: payload_len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok((payload_len as u32).to_be_bytes())
}

/// Build a complete frame message: length prefix followed by the payload
pub fn encode_frame(payload: &[u8]) -> ProtocolResult<Bytes> {
    let header = encode_frame_header(payload.len())?;
    let mut message = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    message.put_slice(&header);
    message.put_slice(payload);
    Ok(message.freeze())
}

/// Where the decoder stands inside the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameProgress {
    /// Between frames, nothing buffered
    Idle,
    /// Part of the length prefix received
    Header { received: usize },
    /// Prefix complete, body incomplete
    Body { expected: usize, received: usize },
}

/// Reassembles length-prefixed frames from arbitrarily split reads
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    expected: Option<usize>,
    max_len: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            expected: None,
            max_len,
        }
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete frame payload, if one is buffered
    ///
    /// Fails without allocating when a length prefix exceeds the limit.
    pub fn next_frame(&mut self) -> ProtocolResult<Option<Bytes>> {
        let expected = match self.expected {
            Some(len) => len,
            None => {
                if self.buffer.len() < FRAME_HEADER_LEN {
                    return Ok(None);
                }
                let len = self.buffer.get_u32() as usize;
                if len > self.max_len {
                    return Err(ProtocolError::FrameTooLarge {
                        size: len,
                        max: self.max_len,
                    });
                }
                self.buffer.reserve(len);
                self.expected = Some(len);
                len
            }
        };

        if self.buffer.len() < expected {
            return Ok(None);
        }

        self.expected = None;
        Ok(Some(self.buffer.split_to(expected).freeze()))
    }

    pub fn progress(&self) -> FrameProgress {
        match self.expected {
            Some(expected) => FrameProgress::Body {
                expected,
                received: self.buffer.len().min(expected),
            },
            None if self.buffer.is_empty() => FrameProgress::Idle,
            None => FrameProgress::Header {
                received: self.buffer.len(),
            },
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
