//! Newline-delimited JSON codec for the telemetry channel

use bytes::{Bytes, BytesMut};

use crate::{LINE_DELIMITER, MAX_LINE_LEN, ProtocolError, ProtocolResult, TelemetrySample};

/// Serialize a sample as one JSON object terminated by `\n`
pub fn encode_line(sample: &TelemetrySample) -> ProtocolResult<Vec<u8>> {
    let mut line = serde_json::to_vec(sample)?;
    if line.contains(&LINE_DELIMITER) {
        return Err(ProtocolError::EmbeddedNewline);
    }
    line.push(LINE_DELIMITER);
    Ok(line)
}

/// Parse one line (without its delimiter) into a sample
pub fn parse_line(line: &[u8]) -> ProtocolResult<TelemetrySample> {
    let text = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
    let text = text.strip_suffix('\r').unwrap_or(text);
    Ok(serde_json::from_str(text)?)
}

/// Reassembles newline-delimited lines from arbitrarily split reads
///
/// Received bytes accumulate in a residual buffer; every complete line is
/// split off greedily. A residual that grows past the limit without a
/// delimiter is discarded.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: BytesMut,
    max_len: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_len,
        }
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete line, if any
    ///
    /// Returns `Some(Err(LineTooLong))` once when an oversized residual is
    /// dropped; decoding continues with the bytes received after it.
    pub fn next_line(&mut self) -> Option<ProtocolResult<Bytes>> {
        if let Some(pos) = self.buffer.iter().position(|&b| b == LINE_DELIMITER) {
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            return Some(Ok(line.freeze()));
        }

        if self.buffer.len() > self.max_len {
            let size = self.buffer.len();
            self.buffer.clear();
            return Some(Err(ProtocolError::LineTooLong {
                size,
                max: self.max_len,
            }));
        }

        None
    }

    /// Bytes buffered after the last complete line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}
