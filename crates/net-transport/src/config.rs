//! Stream configuration

use std::str::FromStr;
use std::time::Duration;

use encoder::EncoderConfig;
use tracing::warn;

use crate::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_FPS, DEFAULT_HOST, DEFAULT_RECV_TIMEOUT,
    DEFAULT_TELEMETRY_INTERVAL, DEFAULT_TELEMETRY_PORT, DEFAULT_VIDEO_PORT, RECV_CHUNK_SIZE,
};

/// Settings shared by both ends of both channels
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Host the servers bind and the clients connect to
    pub host: String,
    pub telemetry_port: u16,
    pub video_port: u16,
    /// Fixed sleep between telemetry sends
    pub telemetry_interval: Duration,
    /// Video frames per second
    pub fps: u32,
    pub connect_timeout: Duration,
    pub recv_timeout: Duration,
    /// Bound on a single server-side write; `None` waits indefinitely
    pub send_timeout: Option<Duration>,
    /// Size of a single client socket read
    pub recv_chunk: usize,
    pub encoder: EncoderConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            telemetry_port: DEFAULT_TELEMETRY_PORT,
            video_port: DEFAULT_VIDEO_PORT,
            telemetry_interval: DEFAULT_TELEMETRY_INTERVAL,
            fps: DEFAULT_FPS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            send_timeout: None,
            recv_chunk: RECV_CHUNK_SIZE,
            encoder: EncoderConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Defaults with overrides from `DRONELINK_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup; unparsable values are logged and ignored
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DRONELINK_HOST").filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(port) = parse_var(&lookup, "DRONELINK_TELEMETRY_PORT") {
            self.telemetry_port = port;
        }
        if let Some(port) = parse_var(&lookup, "DRONELINK_VIDEO_PORT") {
            self.video_port = port;
        }
        match parse_var::<u32, _>(&lookup, "DRONELINK_FPS") {
            Some(0) => warn!("Ignoring DRONELINK_FPS=0"),
            Some(fps) => self.fps = fps,
            None => {}
        }
        if let Some(ms) = parse_var(&lookup, "DRONELINK_TELEMETRY_INTERVAL_MS") {
            self.telemetry_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DRONELINK_SEND_TIMEOUT_MS") {
            self.send_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        self
    }

    pub fn telemetry_addr(&self) -> String {
        format!("{}:{}", self.host, self.telemetry_port)
    }

    pub fn video_addr(&self) -> String {
        format!("{}:{}", self.host, self.video_port)
    }

    /// Sleep between video ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, "Ignoring invalid override: {}", e);
            None
        }
    }
}
