//! Video channel: length-prefixed JPEG frames over TCP

use std::net::SocketAddr;
use std::time::Instant;

use capture::{CaptureConfig, CaptureProvider, CaptureStats, FrameSource};
use encoder::{EncodedFrame, EncoderStats, JpegEncoder, VideoEncoder, decode_jpeg};
use image::RgbImage;
use shared_protocol::{FrameDecoder, FrameProgress, encode_frame};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::{SessionTally, write_message};
use crate::telemetry::connect_stream;
use crate::{SessionEnd, SessionReport, StreamConfig, Tick, TransportError, TransportResult};

/// Receives decoded frames on the ground station
pub trait Viewer: Send {
    /// Show a frame; returning `true` requests shutdown of both channels
    fn present(&mut self, frame: &RgbImage) -> bool;
}

impl<F> Viewer for F
where
    F: FnMut(&RgbImage) -> bool + Send,
{
    fn present(&mut self, frame: &RgbImage) -> bool {
        self(frame)
    }
}

/// Drone side of the video channel
pub struct VideoServer {
    listener: TcpListener,
    config: StreamConfig,
    provider: Box<dyn CaptureProvider>,
}

impl VideoServer {
    /// Bind the video listener; the camera is only opened once a client connects
    pub async fn bind(config: StreamConfig, provider: Box<dyn CaptureProvider>) -> TransportResult<Self> {
        let addr = config.video_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(addr = %listener.local_addr()?, "Video listener bound");

        Ok(Self {
            listener,
            config,
            provider,
        })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one ground station and stream frames until the session ends
    pub async fn run(self, cancel: CancellationToken) -> TransportResult<SessionReport> {
        let Self {
            listener,
            config,
            provider,
        } = self;

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Video server cancelled before a client connected");
                return Ok(SessionReport::empty(SessionEnd::Cancelled));
            }
            result = listener.accept() => {
                let (stream, addr) = result.map_err(TransportError::Accept)?;
                info!(%addr, "Video client connected");
                stream
            }
        };

        drop(listener);

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let encoder = JpegEncoder::new(config.encoder.clone())?;

        // Capture and encoding block; the async side only writes
        let (frame_tx, mut frame_rx) = mpsc::channel(1);
        let worker = tokio::task::spawn_blocking({
            let config = config.clone();
            let cancel = cancel.clone();
            move || capture_loop(provider, encoder, config, cancel, frame_tx)
        });

        let mut tally = SessionTally::default();
        // `None` when the worker hung up, which it only does after a panic
        let end = loop {
            let produced = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Some(SessionEnd::Cancelled),
                produced = frame_rx.recv() => produced,
            };

            let tick = match produced {
                Some(Some(frame)) => {
                    if cancel.is_cancelled() {
                        break Some(SessionEnd::Cancelled);
                    }
                    send_frame(&mut stream, &frame, &config).await
                }
                Some(None) => Tick::Skipped,
                None => break None,
            };
            if let Some(end) = tally.record(tick) {
                break Some(end);
            }
        };

        drop(frame_rx);
        let (capture, encoding) = worker
            .await
            .map_err(|e| TransportError::Worker(e.to_string()))?;
        let Some(end) = end else {
            return Err(TransportError::Worker("capture worker stopped".to_string()));
        };

        let report = tally.finish(end);
        info!(
            end = ?report.end,
            sent = report.delivered,
            skipped = report.skipped,
            camera_frames = capture.camera_frames,
            synthetic_frames = capture.synthetic_frames,
            avg_encode_us = encoding.avg_encode_time_us,
            "Video session ended"
        );
        Ok(report)
    }
}

/// Produce, encode and hand over one frame per tick
///
/// `None` in the channel marks a tick whose frame could not be encoded.
fn capture_loop(
    mut provider: Box<dyn CaptureProvider>,
    mut encoder: JpegEncoder,
    config: StreamConfig,
    cancel: CancellationToken,
    frames: mpsc::Sender<Option<EncodedFrame>>,
) -> (CaptureStats, EncoderStats) {
    let capture_config = CaptureConfig {
        width: encoder.config().width,
        height: encoder.config().height,
    };
    let mut source = FrameSource::open(provider.as_mut(), capture_config);
    let interval = config.frame_interval();
    let mut tick: u64 = 0;

    while !cancel.is_cancelled() {
        let started = Instant::now();
        let frame = source.next_frame(tick, chrono::Local::now().time());

        let encoded = match encoder.encode(&frame) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                warn!(tick, "Skipping frame: {}", e);
                None
            }
        };
        tick += 1;

        if frames.blocking_send(encoded).is_err() {
            debug!("Video sender gone, stopping capture");
            break;
        }

        debug!(tick, elapsed = ?started.elapsed(), "Frame produced");
        std::thread::sleep(interval);
    }

    (source.stats(), encoder.stats())
}

async fn send_frame(stream: &mut TcpStream, frame: &EncodedFrame, config: &StreamConfig) -> Tick {
    match encode_frame(&frame.data) {
        Ok(message) => write_message(stream, &message, config.send_timeout).await,
        Err(e) => {
            warn!(sequence = frame.sequence, "Skipping frame: {}", e);
            Tick::Skipped
        }
    }
}

/// Ground station side of the video channel
pub struct VideoClient {
    stream: TcpStream,
    config: StreamConfig,
}

impl VideoClient {
    /// Connect to the drone, bounded by the connect timeout
    pub async fn connect(config: StreamConfig) -> TransportResult<Self> {
        let stream = connect_stream(config.video_addr(), &config).await?;
        info!(addr = %config.video_addr(), "Video channel connected");
        Ok(Self { stream, config })
    }

    /// Receive frames and present them until the session ends
    ///
    /// A viewer cancel request trips `cancel`, which stops the telemetry
    /// channel sharing the same token.
    pub async fn run<V>(self, cancel: CancellationToken, viewer: &mut V) -> TransportResult<SessionReport>
    where
        V: Viewer + ?Sized,
    {
        let Self { mut stream, config } = self;
        let mut decoder = FrameDecoder::new();
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
                    // Partial frames stay buffered in the decoder
                    debug!(progress = ?decoder.progress(), "No video within {:?}", config.recv_timeout);
                    if let Some(end) = tally.record(Tick::Idle) {
                        break end;
                    }
                    continue;
                }
                Ok(Err(e)) => {
                    warn!("Video receive failed: {}", e);
                    break SessionEnd::ReceiveFailed(e.kind());
                }
                Ok(Ok(0)) => break closed_end(decoder.progress()),
                Ok(Ok(n)) => n,
            };

            decoder.extend(&buf[..n]);
            loop {
                let payload = match decoder.next_frame() {
                    Ok(Some(payload)) => payload,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Video stream corrupt: {}", e);
                        break 'session SessionEnd::Protocol(e.to_string());
                    }
                };

                let image = match decode_jpeg(&payload) {
                    Ok(image) => image,
                    Err(e) => {
                        warn!(bytes = payload.len(), "Dropping undecodable frame: {}", e);
                        tally.record(Tick::Skipped);
                        continue;
                    }
                };

                let cancel_requested = viewer.present(&image);
                tally.record(Tick::Delivered);
                if cancel_requested {
                    info!("Viewer requested shutdown");
                    cancel.cancel();
                    break 'session SessionEnd::ViewerClosed;
                }
            }
        };

        let report = tally.finish(end);
        info!(
            end = ?report.end,
            received = report.delivered,
            dropped = report.skipped,
            "Video session ended"
        );
        Ok(report)
    }
}

fn closed_end(progress: FrameProgress) -> SessionEnd {
    match progress {
        FrameProgress::Idle | FrameProgress::Header { .. } => SessionEnd::PeerClosed,
        FrameProgress::Body { expected, received } => {
            warn!(expected, received, "Peer closed inside a frame");
            SessionEnd::Truncated { expected, received }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::{CaptureDevice, CaptureError, CaptureResult, NoCamera};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn test_config(port: u16) -> StreamConfig {
        StreamConfig {
            video_port: port,
            fps: 50,
            recv_timeout: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    fn is_green(pixel: [u8; 3]) -> bool {
        pixel[1] > 200 && pixel[0] < 60 && pixel[2] < 60
    }

    async fn raw_listener() -> (TcpListener, StreamConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = test_config(listener.local_addr().unwrap().port());
        (listener, config)
    }

    fn jpeg_payload() -> Vec<u8> {
        let frame = capture::Frame {
            image: RgbImage::from_pixel(640, 360, image::Rgb([0, 255, 0])),
            origin: capture::FrameOrigin::Synthetic,
            tick: 0,
        };
        let mut encoder = JpegEncoder::new(Default::default()).unwrap();
        encoder.encode(&frame).unwrap().data.to_vec()
    }

    #[tokio::test]
    async fn test_synthetic_frames_end_to_end() {
        let server = VideoServer::bind(test_config(0), Box::new(NoCamera)).await.unwrap();
        let config = test_config(server.local_addr().unwrap().port());
        let cancel = CancellationToken::new();
        let server_task = tokio::spawn(server.run(cancel.clone()));

        let client = VideoClient::connect(config).await.unwrap();
        let mut frames = Vec::new();
        let mut viewer = |image: &RgbImage| {
            frames.push(image.clone());
            frames.len() == 3
        };
        let report = client.run(cancel.clone(), &mut viewer).await.unwrap();

        assert_eq!(report.end, SessionEnd::ViewerClosed);
        assert_eq!(report.delivered, 3);
        assert!(cancel.is_cancelled());

        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.dimensions(), (640, 360));
        }
        // Tick 2 puts the bar at columns 0..70
        assert!(is_green(frames[2].get_pixel(30, 180).0));
        assert!(!is_green(frames[2].get_pixel(200, 180).0));

        let server_report = tokio::time::timeout(Duration::from_secs(5), server_task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(
            server_report.end,
            SessionEnd::Cancelled | SessionEnd::SendFailed(_)
        ));
        assert!(server_report.delivered >= 3);
    }

    /// Camera that fails after a fixed number of reads
    struct FlakyCamera {
        reads_left: usize,
        reads: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
    }

    impl CaptureDevice for FlakyCamera {
        fn read(&mut self) -> CaptureResult<RgbImage> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.reads_left == 0 {
                return Err(CaptureError::Disconnected);
            }
            self.reads_left -= 1;
            Ok(RgbImage::from_pixel(320, 180, image::Rgb([0, 0, 255])))
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_camera_failure_switches_to_synthetic() {
        let reads = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicBool::new(false));
        let provider = {
            let reads = Arc::clone(&reads);
            let released = Arc::clone(&released);
            move || -> Option<Box<dyn CaptureDevice>> {
                Some(Box::new(FlakyCamera {
                    reads_left: 2,
                    reads: Arc::clone(&reads),
                    released: Arc::clone(&released),
                }))
            }
        };

        let server = VideoServer::bind(test_config(0), Box::new(provider)).await.unwrap();
        let config = test_config(server.local_addr().unwrap().port());
        let cancel = CancellationToken::new();
        let server_task = tokio::spawn(server.run(cancel.clone()));

        let client = VideoClient::connect(config).await.unwrap();
        let mut frames = Vec::new();
        let mut viewer = |image: &RgbImage| {
            frames.push(image.clone());
            frames.len() == 6
        };
        client.run(cancel.clone(), &mut viewer).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), server_task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Two blue camera frames, then synthetic frames with a black background
        let corner = |i: usize| frames[i].get_pixel(600, 340).0;
        assert!(corner(0)[2] > 200 && corner(1)[2] > 200);
        for i in 2..6 {
            assert!(corner(i).iter().all(|&c| c < 40));
        }
        // The failed read is the last one the camera ever sees
        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_peer_closing_mid_body_is_truncation() {
        let (listener, config) = raw_listener().await;
        let feeder = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let payload = jpeg_payload();
            stream.write_all(&encode_frame(&payload).unwrap()).await.unwrap();
            stream.write_all(&1000u32.to_be_bytes()).await.unwrap();
            stream.write_all(&[0u8; 10]).await.unwrap();
        });

        let client = VideoClient::connect(config).await.unwrap();
        let mut presented = 0;
        let mut viewer = |_: &RgbImage| {
            presented += 1;
            false
        };
        let report = client.run(CancellationToken::new(), &mut viewer).await.unwrap();
        feeder.await.unwrap();

        assert_eq!(
            report.end,
            SessionEnd::Truncated {
                expected: 1000,
                received: 10
            }
        );
        assert_eq!(report.delivered, 1);
        assert_eq!(presented, 1);
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_skipped() {
        let (listener, config) = raw_listener().await;
        let feeder = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let payload = jpeg_payload();
            stream.write_all(&encode_frame(b"garbage").unwrap()).await.unwrap();
            stream.write_all(&encode_frame(&[]).unwrap()).await.unwrap();
            // Deliver a valid frame one byte at a time
            for byte in encode_frame(&payload).unwrap().iter() {
                stream.write_all(&[*byte]).await.unwrap();
            }
        });

        let client = VideoClient::connect(config).await.unwrap();
        let mut presented = Vec::new();
        let mut viewer = |image: &RgbImage| {
            presented.push(image.get_pixel(320, 180).0);
            false
        };
        let report = client.run(CancellationToken::new(), &mut viewer).await.unwrap();
        feeder.await.unwrap();

        assert_eq!(report.end, SessionEnd::PeerClosed);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.delivered, 1);
        assert!(is_green(presented[0]));
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_is_protocol_error() {
        let (listener, config) = raw_listener().await;
        let feeder = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
            // Keep the connection open until the client gives up
            let mut sink = [0u8; 1];
            let _ = stream.read(&mut sink).await;
        });

        let client = VideoClient::connect(config).await.unwrap();
        let mut viewer = |_: &RgbImage| false;
        let report = client.run(CancellationToken::new(), &mut viewer).await.unwrap();
        assert!(matches!(report.end, SessionEnd::Protocol(_)));
        feeder.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_timeout_keeps_waiting() {
        let (listener, config) = raw_listener().await;
        let feeder = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Longer than the receive timeout, with nothing pending
            tokio::time::sleep(Duration::from_millis(250)).await;
            stream.write_all(&encode_frame(&jpeg_payload()).unwrap()).await.unwrap();
        });

        let client = VideoClient::connect(config).await.unwrap();
        let mut viewer = |_: &RgbImage| false;
        let report = client.run(CancellationToken::new(), &mut viewer).await.unwrap();
        feeder.await.unwrap();

        assert_eq!(report.end, SessionEnd::PeerClosed);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn test_stall_inside_frame_keeps_partial_frame() {
        let (listener, config) = raw_listener().await;
        let feeder = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let message = encode_frame(&jpeg_payload()).unwrap();
            let half = message.len() / 2;

            // First frame stalls inside the length prefix, second inside the body
            stream.write_all(&message[..2]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(250)).await;
            stream.write_all(&message[2..]).await.unwrap();

            stream.write_all(&message[..half]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(250)).await;
            stream.write_all(&message[half..]).await.unwrap();
        });

        let client = VideoClient::connect(config).await.unwrap();
        let mut presented = Vec::new();
        let mut viewer = |image: &RgbImage| {
            presented.push(image.get_pixel(320, 180).0);
            false
        };
        let report = client.run(CancellationToken::new(), &mut viewer).await.unwrap();
        feeder.await.unwrap();

        assert_eq!(report.end, SessionEnd::PeerClosed);
        assert_eq!(report.delivered, 2);
        assert!(presented.iter().all(|&pixel| is_green(pixel)));
    }

    #[tokio::test]
    async fn test_cancel_stops_server_without_further_frames() {
        let config = StreamConfig {
            fps: 5,
            ..test_config(0)
        };
        let server = VideoServer::bind(config.clone(), Box::new(NoCamera)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let server_task = tokio::spawn(server.run(cancel.clone()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await.unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
        stream.read_exact(&mut body).await.unwrap();
        assert!(decode_jpeg(&body).is_ok());

        // The next frame is a full interval away
        cancel.cancel();
        let report = tokio::time::timeout(
            config.frame_interval() + Duration::from_millis(500),
            server_task,
        )
        .await
        .unwrap()
        .unwrap()
        .unwrap();
        assert_eq!(report.end, SessionEnd::Cancelled);
        assert_eq!(report.delivered, 1);

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    struct CrashingCamera;

    impl CaptureDevice for CrashingCamera {
        fn read(&mut self) -> CaptureResult<RgbImage> {
            panic!("camera driver crashed");
        }
    }

    #[tokio::test]
    async fn test_worker_panic_ends_unit_with_error() {
        let provider = || -> Option<Box<dyn CaptureDevice>> { Some(Box::new(CrashingCamera)) };
        let server = VideoServer::bind(test_config(0), Box::new(provider)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(server.run(CancellationToken::new()));

        let _stream = TcpStream::connect(addr).await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), server_task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(TransportError::Worker(_))));
    }

    #[tokio::test]
    async fn test_cancel_stops_client_promptly() {
        let (listener, config) = raw_listener().await;
        let _holder = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let cancel = CancellationToken::new();
        let client = VideoClient::connect(config).await.unwrap();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut viewer = |_: &RgbImage| false;
        let report = tokio::time::timeout(
            Duration::from_secs(1),
            client.run(cancel, &mut viewer),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(report.end, SessionEnd::Cancelled);
    }
}
