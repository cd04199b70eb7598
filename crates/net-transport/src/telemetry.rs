//! Telemetry channel: newline-delimited JSON samples over TCP

use std::net::SocketAddr;

use rand::rngs::StdRng;
use shared_protocol::{LineDecoder, TelemetryGenerator, TelemetrySample, encode_line, parse_line};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::{SessionTally, write_message};
use crate::{SessionEnd, SessionReport, StreamConfig, Tick, TransportError, TransportResult};

/// Drone side of the telemetry channel
pub struct TelemetryServer {
    listener: TcpListener,
    config: StreamConfig,
    generator: TelemetryGenerator<StdRng>,
}

impl TelemetryServer {
    /// Bind the telemetry listener
    pub async fn bind(config: StreamConfig) -> TransportResult<Self> {
        let addr = config.telemetry_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(addr = %listener.local_addr()?, "Telemetry listener bound");

        Ok(Self {
            listener,
            config,
            generator: TelemetryGenerator::new(),
        })
    }

    /// Replace the sample generator
    pub fn with_generator(mut self, generator: TelemetryGenerator<StdRng>) -> Self {
        self.generator = generator;
        self
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one ground station and stream samples until the session ends
    pub async fn run(self, cancel: CancellationToken) -> TransportResult<SessionReport> {
        let Self {
            listener,
            config,
            mut generator,
        } = self;

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Telemetry server cancelled before a client connected");
                return Ok(SessionReport::empty(SessionEnd::Cancelled));
            }
            result = listener.accept() => {
                let (stream, addr) = result.map_err(TransportError::Accept)?;
                info!(%addr, "Telemetry client connected");
                stream
            }
        };

        // One session per process
        drop(listener);

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let mut tally = SessionTally::default();
        let end = loop {
            if cancel.is_cancelled() {
                break SessionEnd::Cancelled;
            }

            let tick = match encode_line(&generator.sample()) {
                Ok(line) => write_message(&mut stream, &line, config.send_timeout).await,
                Err(e) => {
                    warn!("Dropping unencodable sample: {}", e);
                    Tick::Skipped
                }
            };
            if let Some(end) = tally.record(tick) {
                break end;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break SessionEnd::Cancelled,
                _ = tokio::time::sleep(config.telemetry_interval) => {}
            }
        };

        let report = tally.finish(end);
        info!(
            end = ?report.end,
            sent = report.delivered,
            "Telemetry session ended"
        );
        Ok(report)
    }
}

/// Ground station side of the telemetry channel
pub struct TelemetryClient {
    stream: TcpStream,
    config: StreamConfig,
}

impl TelemetryClient {
    /// Connect to the drone, bounded by the connect timeout
    pub async fn connect(config: StreamConfig) -> TransportResult<Self> {
        let stream = connect_stream(config.telemetry_addr(), &config).await?;
        info!(addr = %config.telemetry_addr(), "Telemetry channel connected");
        Ok(Self { stream, config })
    }

    /// Receive samples and hand each to `on_sample` until the session ends
    ///
    /// Malformed lines are dropped; the lines around them still arrive.
    pub async fn run<F>(self, cancel: CancellationToken, mut on_sample: F) -> TransportResult<SessionReport>
    where
        F: FnMut(TelemetrySample),
    {
        let Self { mut stream, config } = self;
        let mut decoder = LineDecoder::new();
        let mut buf = vec![0u8; config.recv_chunk];
        let mut tally = SessionTally::default();

        let end = 'session: loop {
            if cancel.is_cancelled() {
                break SessionEnd::Cancelled;
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => break SessionEnd::Cancelled,
                read = tokio::time::timeout(config.recv_timeout, stream.read(&mut buf)) => read,
            };

            let n = match read {
                Err(_) => {
                    debug!(pending = decoder.pending(), "No telemetry within {:?}", config.recv_timeout);
                    if let Some(end) = tally.record(Tick::Idle) {
                        break end;
                    }
                    continue;
                }
                Ok(Err(e)) => {
                    warn!("Telemetry receive failed: {}", e);
                    break SessionEnd::ReceiveFailed(e.kind());
                }
                Ok(Ok(0)) => {
                    if decoder.pending() > 0 {
                        debug!(bytes = decoder.pending(), "Discarding unterminated telemetry line");
                    }
                    break SessionEnd::PeerClosed;
                }
                Ok(Ok(n)) => n,
            };

            decoder.extend(&buf[..n]);
            while let Some(line) = decoder.next_line() {
                let tick = match line.and_then(|line| parse_line(&line)) {
                    Ok(sample) => {
                        on_sample(sample);
                        Tick::Delivered
                    }
                    Err(e) => {
                        warn!("Dropping malformed telemetry line: {}", e);
                        Tick::Skipped
                    }
                };
                if let Some(end) = tally.record(tick) {
                    break 'session end;
                }
            }
        };

        let report = tally.finish(end);
        info!(
            end = ?report.end,
            received = report.delivered,
            dropped = report.skipped,
            "Telemetry session ended"
        );
        Ok(report)
    }
}

/// Connect with the configured timeout
pub(crate) async fn connect_stream(addr: String, config: &StreamConfig) -> TransportResult<TcpStream> {
    let result = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr)).await;
    match result {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(TransportError::ConnectionFailed { addr, source }),
        Err(_) => Err(TransportError::ConnectTimeout { addr }),
    }
}
