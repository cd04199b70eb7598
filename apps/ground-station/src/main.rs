//! DroneLink ground station
//!
//! Receives telemetry and video from the drone. Frames go to a logging
//! viewer; set `DRONELINK_VIEWER_MAX_FRAMES` to stop after that many.

use image::RgbImage;
use net_transport::{
    StreamConfig, Supervisor, SupervisorConfig, TelemetryClient, UnitExit, VideoClient, Viewer,
};
use shared_protocol::TelemetrySample;
use tracing::{debug, info, warn};

/// Viewer that logs frames instead of drawing them
struct LogViewer {
    frames: u64,
    max_frames: Option<u64>,
}

impl LogViewer {
    fn from_env() -> Self {
        let max_frames = match std::env::var("DRONELINK_VIEWER_MAX_FRAMES") {
            Ok(raw) => match raw.trim().parse() {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(value = %raw, "Ignoring DRONELINK_VIEWER_MAX_FRAMES: {}", e);
                    None
                }
            },
            Err(_) => None,
        };
        Self {
            frames: 0,
            max_frames,
        }
    }
}

impl Viewer for LogViewer {
    fn present(&mut self, frame: &RgbImage) -> bool {
        self.frames += 1;
        debug!(
            frame = self.frames,
            width = frame.width(),
            height = frame.height(),
            "Frame received"
        );
        if self.frames % 25 == 0 {
            info!(frames = self.frames, "Video feed running");
        }
        self.max_frames.is_some_and(|max| self.frames >= max)
    }
}

fn log_sample(sample: TelemetrySample) {
    info!(
        x = sample.x,
        y = sample.y,
        alt = sample.alt,
        spd = sample.spd,
        bat = sample.bat,
        ts = sample.ts,
        "Telemetry"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ground_station=info".parse()?)
                .add_directive("net_transport=info".parse()?),
        )
        .init();

    let config = StreamConfig::from_env();
    info!(
        telemetry = %config.telemetry_addr(),
        video = %config.video_addr(),
        "Starting DroneLink ground station"
    );

    let supervisor = Supervisor::new(SupervisorConfig::default());

    let telemetry = {
        let config = config.clone();
        let cancel = supervisor.token();
        async move {
            TelemetryClient::connect(config)
                .await?
                .run(cancel, log_sample)
                .await
        }
    };

    let video = {
        let cancel = supervisor.token();
        let mut viewer = LogViewer::from_env();
        async move { VideoClient::connect(config).await?.run(cancel, &mut viewer).await }
    };

    let report = supervisor.run(telemetry, video).await;
    info!(trigger = ?report.trigger, "Ground station stopped");

    for (unit, exit) in [("telemetry", &report.telemetry), ("video", &report.video)] {
        match exit {
            UnitExit::Finished(session) => info!(
                unit,
                end = ?session.end,
                received = session.delivered,
                dropped = session.skipped,
                "Session summary"
            ),
            other => warn!(unit, exit = ?other, "Unit did not finish cleanly"),
        }
    }

    Ok(())
}
