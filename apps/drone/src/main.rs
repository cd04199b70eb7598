//! DroneLink drone process
//!
//! Serves telemetry and video to a single ground station.

use capture::NoCamera;
use net_transport::{
    StreamConfig, Supervisor, SupervisorConfig, TelemetryServer, UnitExit, VideoServer,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drone=info".parse()?)
                .add_directive("net_transport=info".parse()?)
                .add_directive("capture=info".parse()?),
        )
        .init();

    let config = StreamConfig::from_env();
    info!(
        telemetry = %config.telemetry_addr(),
        video = %config.video_addr(),
        fps = config.fps,
        "Starting DroneLink drone"
    );

    let supervisor = Supervisor::new(SupervisorConfig::default());

    let telemetry = {
        let config = config.clone();
        let cancel = supervisor.token();
        async move { TelemetryServer::bind(config).await?.run(cancel).await }
    };

    // No camera driver is linked in; every session streams synthetic frames
    let video = {
        let cancel = supervisor.token();
        async move {
            VideoServer::bind(config, Box::new(NoCamera))
                .await?
                .run(cancel)
                .await
        }
    };

    let report = supervisor.run(telemetry, video).await;
    info!(trigger = ?report.trigger, "Drone stopped");

    for (unit, exit) in [("telemetry", &report.telemetry), ("video", &report.video)] {
        match exit {
            UnitExit::Finished(session) => info!(
                unit,
                end = ?session.end,
                sent = session.delivered,
                skipped = session.skipped,
                "Session summary"
            ),
            other => warn!(unit, exit = ?other, "Unit did not finish cleanly"),
        }
    }

    Ok(())
}
