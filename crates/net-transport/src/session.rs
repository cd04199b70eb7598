//! Per-iteration outcomes and session reports

use std::io;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown signal observed
    Cancelled,
    /// Peer closed the connection between messages
    PeerClosed,
    /// Peer closed the connection inside a frame body
    Truncated { expected: usize, received: usize },
    /// A server-side write failed
    SendFailed(io::ErrorKind),
    /// A server-side write exceeded the configured send timeout
    SendTimedOut,
    /// A client-side read failed
    ReceiveFailed(io::ErrorKind),
    /// The viewer asked to stop
    ViewerClosed,
    /// The peer violated the wire format
    Protocol(String),
}

/// Outcome of one loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// A message was sent or handed to the consumer
    Delivered,
    /// A message was dropped; the session continues
    Skipped,
    /// Nothing happened this iteration (receive timeout)
    Idle,
    /// The session is over
    Stop(SessionEnd),
}

/// Summary returned when a unit's session ends normally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub end: SessionEnd,
    /// Messages sent (server) or delivered to the consumer (client)
    pub delivered: u64,
    /// Messages dropped as malformed or unencodable
    pub skipped: u64,
}

impl SessionReport {
    /// Report for a unit that ended before any session started
    pub fn empty(end: SessionEnd) -> Self {
        Self {
            end,
            delivered: 0,
            skipped: 0,
        }
    }
}

/// Running counters of a session
#[derive(Debug, Default)]
pub(crate) struct SessionTally {
    delivered: u64,
    skipped: u64,
}

impl SessionTally {
    /// Count an iteration; returns the end reason once the session stops
    pub(crate) fn record(&mut self, tick: Tick) -> Option<SessionEnd> {
        match tick {
            Tick::Delivered => self.delivered += 1,
            Tick::Skipped => self.skipped += 1,
            Tick::Idle => {}
            Tick::Stop(end) => return Some(end),
        }
        None
    }

    pub(crate) fn finish(self, end: SessionEnd) -> SessionReport {
        SessionReport {
            end,
            delivered: self.delivered,
            skipped: self.skipped,
        }
    }
}

/// Write a whole message, optionally bounded by a timeout
pub(crate) async fn write_message<W>(writer: &mut W, data: &[u8], limit: Option<Duration>) -> Tick
where
    W: AsyncWrite + Unpin,
{
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, writer.write_all(data)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?limit, "Send timed out");
                return Tick::Stop(SessionEnd::SendTimedOut);
            }
        },
        None => writer.write_all(data).await,
    };

    match result {
        Ok(()) => {
            debug!(bytes = data.len(), "Message sent");
            Tick::Delivered
        }
        Err(e) => {
            warn!("Send failed: {}", e);
            Tick::Stop(SessionEnd::SendFailed(e.kind()))
        }
    }
}
