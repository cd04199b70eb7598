//! Runs the telemetry and video units of one process under a shared shutdown token

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{SessionReport, TransportError, TransportResult};

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often unit liveness is checked
    pub poll_interval: Duration,
    /// How long units get to finish after shutdown before they are aborted
    pub shutdown_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(3),
        }
    }
}

/// The two units of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Telemetry,
    Video,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Telemetry => write!(f, "telemetry"),
            Unit::Video => write!(f, "video"),
        }
    }
}

/// What caused the shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// Ctrl-C or the caller's interrupt future
    Interrupt,
    /// A unit finished on its own
    UnitExited(Unit),
    /// The shared token was cancelled, e.g. by the viewer
    Cancelled,
}

/// How a unit ended
#[derive(Debug)]
pub enum UnitExit {
    Finished(SessionReport),
    Failed(TransportError),
    Panicked,
    /// Still running after the grace period
    Aborted,
}

impl UnitExit {
    pub fn report(&self) -> Option<&SessionReport> {
        match self {
            UnitExit::Finished(report) => Some(report),
            _ => None,
        }
    }
}

/// Outcome of a supervised run
#[derive(Debug)]
pub struct SupervisorReport {
    pub trigger: ShutdownTrigger,
    pub telemetry: UnitExit,
    pub video: UnitExit,
}

/// Owns the shutdown token shared by both units
pub struct Supervisor {
    config: SupervisorConfig,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token to hand to each unit
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run both units until Ctrl-C, a unit exit, or cancellation
    pub async fn run<T, V>(self, telemetry: T, video: V) -> SupervisorReport
    where
        T: Future<Output = TransportResult<SessionReport>> + Send + 'static,
        V: Future<Output = TransportResult<SessionReport>> + Send + 'static,
    {
        self.run_until(telemetry, video, ctrl_c()).await
    }

    /// Run both units until `interrupt` completes, a unit exits, or cancellation
    pub async fn run_until<T, V, I>(self, telemetry: T, video: V, interrupt: I) -> SupervisorReport
    where
        T: Future<Output = TransportResult<SessionReport>> + Send + 'static,
        V: Future<Output = TransportResult<SessionReport>> + Send + 'static,
        I: Future<Output = ()>,
    {
        let telemetry = tokio::spawn(telemetry);
        let video = tokio::spawn(video);
        info!("Telemetry and video units started");

        tokio::pin!(interrupt);
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let trigger = loop {
            tokio::select! {
                biased;
                _ = &mut interrupt => break ShutdownTrigger::Interrupt,
                _ = self.cancel.cancelled() => break ShutdownTrigger::Cancelled,
                _ = poll.tick() => {
                    if telemetry.is_finished() {
                        break ShutdownTrigger::UnitExited(Unit::Telemetry);
                    }
                    if video.is_finished() {
                        break ShutdownTrigger::UnitExited(Unit::Video);
                    }
                }
            }
        };

        info!(?trigger, "Shutting down");
        self.cancel.cancel();

        let deadline = Instant::now() + self.config.shutdown_grace;
        let telemetry = join_unit(Unit::Telemetry, telemetry, deadline).await;
        let video = join_unit(Unit::Video, video, deadline).await;

        SupervisorReport {
            trigger,
            telemetry,
            video,
        }
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn join_unit(
    unit: Unit,
    mut handle: JoinHandle<TransportResult<SessionReport>>,
    deadline: Instant,
) -> UnitExit {
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(Ok(report))) => {
            info!(%unit, end = ?report.end, "Unit finished");
            UnitExit::Finished(report)
        }
        Ok(Ok(Err(e))) => {
            error!(%unit, "Unit failed: {}", e);
            UnitExit::Failed(e)
        }
        Ok(Err(e)) if e.is_panic() => {
            error!(%unit, "Unit panicked");
            UnitExit::Panicked
        }
        Ok(Err(_)) => UnitExit::Aborted,
        Err(_) => {
            warn!(%unit, "Unit still running after grace period, aborting");
            handle.abort();
            UnitExit::Aborted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionEnd;

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(200),
        }
    }

    /// Unit that runs until the token is cancelled
    fn cooperative(cancel: CancellationToken) -> impl Future<Output = TransportResult<SessionReport>> {
        async move {
            cancel.cancelled().await;
            Ok(SessionReport::empty(SessionEnd::Cancelled))
        }
    }

    #[tokio::test]
    async fn test_interrupt_stops_both_units() {
        let supervisor = Supervisor::new(fast_config());
        let token = supervisor.token();
        let report = supervisor
            .run_until(
                cooperative(token.clone()),
                cooperative(token.clone()),
                tokio::time::sleep(Duration::from_millis(30)),
            )
            .await;

        assert_eq!(report.trigger, ShutdownTrigger::Interrupt);
        assert!(token.is_cancelled());
        assert_eq!(
            report.telemetry.report().map(|r| &r.end),
            Some(&SessionEnd::Cancelled)
        );
        assert_eq!(
            report.video.report().map(|r| &r.end),
            Some(&SessionEnd::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_unit_exit_stops_the_other() {
        let supervisor = Supervisor::new(fast_config());
        let token = supervisor.token();
        let report = supervisor
            .run_until(
                async { Ok::<_, TransportError>(SessionReport::empty(SessionEnd::PeerClosed)) },
                cooperative(token.clone()),
                std::future::pending::<()>(),
            )
            .await;

        assert_eq!(report.trigger, ShutdownTrigger::UnitExited(Unit::Telemetry));
        assert!(token.is_cancelled());
        assert!(matches!(report.video, UnitExit::Finished(_)));
    }

    #[tokio::test]
    async fn test_setup_failure_stops_the_other() {
        let supervisor = Supervisor::new(fast_config());
        let token = supervisor.token();
        let report = supervisor
            .run_until(
                cooperative(token.clone()),
                async {
                    Err::<SessionReport, _>(TransportError::ConnectTimeout {
                        addr: "127.0.0.1:9001".to_string(),
                    })
                },
                std::future::pending::<()>(),
            )
            .await;

        assert_eq!(report.trigger, ShutdownTrigger::UnitExited(Unit::Video));
        assert!(matches!(
            report.video,
            UnitExit::Failed(TransportError::ConnectTimeout { .. })
        ));
        assert!(matches!(report.telemetry, UnitExit::Finished(_)));
    }

    #[tokio::test]
    async fn test_unit_cancel_is_a_trigger() {
        let supervisor = Supervisor::new(fast_config());
        let token = supervisor.token();
        let viewer_token = token.clone();
        let report = supervisor
            .run_until(
                cooperative(token.clone()),
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    viewer_token.cancel();
                    Ok::<_, TransportError>(SessionReport::empty(SessionEnd::ViewerClosed))
                },
                std::future::pending::<()>(),
            )
            .await;

        // Either observation is valid depending on which the poll sees first
        assert!(matches!(
            report.trigger,
            ShutdownTrigger::Cancelled | ShutdownTrigger::UnitExited(Unit::Video)
        ));
        assert_eq!(
            report.video.report().map(|r| &r.end),
            Some(&SessionEnd::ViewerClosed)
        );
    }

    #[tokio::test]
    async fn test_stuck_unit_is_aborted() {
        let supervisor = Supervisor::new(fast_config());
        let token = supervisor.token();
        let started = Instant::now();
        let report = supervisor
            .run_until(
                cooperative(token.clone()),
                async {
                    // Ignores the token, like a write to a stalled peer
                    std::future::pending::<()>().await;
                    Ok::<_, TransportError>(SessionReport::empty(SessionEnd::Cancelled))
                },
                tokio::time::sleep(Duration::from_millis(20)),
            )
            .await;

        assert!(matches!(report.telemetry, UnitExit::Finished(_)));
        assert!(matches!(report.video, UnitExit::Aborted));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_panicking_unit() {
        let supervisor = Supervisor::new(fast_config());
        let token = supervisor.token();
        let report = supervisor
            .run_until(
                async {
                    if true {
                        panic!("telemetry unit exploded");
                    }
                    Ok::<_, TransportError>(SessionReport::empty(SessionEnd::Cancelled))
                },
                cooperative(token.clone()),
                std::future::pending::<()>(),
            )
            .await;

        assert_eq!(report.trigger, ShutdownTrigger::UnitExited(Unit::Telemetry));
        assert!(matches!(report.telemetry, UnitExit::Panicked));
    }
}
