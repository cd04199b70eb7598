//! Network Transport - TCP telemetry and video channels for DroneLink
//!
//! Each channel serves exactly one session: a server accepts a single
//! client, a client connects once, and neither side reconnects. Every
//! loop observes a shared [`CancellationToken`] between iterations, and
//! the [`Supervisor`] runs both channels of a process under one token.

mod config;
mod error;
mod session;
mod supervisor;
mod telemetry;
mod video;

pub use config::*;
pub use error::*;
pub use session::*;
pub use supervisor::*;
pub use telemetry::*;
pub use video::*;

pub use tokio_util::sync::CancellationToken;

use std::time::Duration;

/// Default bind/connect host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default telemetry port
pub const DEFAULT_TELEMETRY_PORT: u16 = 9000;

/// Default video port
pub const DEFAULT_VIDEO_PORT: u16 = 9001;

/// Delay between telemetry samples
pub const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Video frames per second
pub const DEFAULT_FPS: u32 = 5;

/// Timeout for the client connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client receive timeout; expiry means "no data yet"
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Size of a single client socket read
pub const RECV_CHUNK_SIZE: usize = 4096;
