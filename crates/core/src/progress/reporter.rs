//! Rate-limited status text updates.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::transport::{StatusTarget, TransportAdapter};

use super::config::ProgressConfig;
use super::sink::ProgressSink;
use super::types::{ProgressEvent, Stage};

const BAR_WIDTH: usize = 10;

enum Command {
    Register { job_id: String, target: StatusTarget },
    Report(ProgressEvent),
    Finish {
        job_id: String,
        ack: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable handle to a running reporter.
#[derive(Clone)]
pub struct ProgressHandle {
    tx: mpsc::Sender<Command>,
    shutdown: CancellationToken,
}

impl ProgressHandle {
    /// Starts tracking a job whose status lives at `target`.
    pub async fn register(&self, job_id: &str, target: StatusTarget) {
        let cmd = Command::Register {
            job_id: job_id.to_string(),
            target,
        };
        if self.tx.send(cmd).await.is_err() {
            debug!(job_id = %job_id, "Progress reporter is gone, not registering");
        }
    }

    /// Queues an event. Never blocks; the event is dropped if the inbox is full.
    pub fn report(&self, event: ProgressEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(Command::Report(event)) {
            debug!("Progress inbox full, dropping event");
        }
    }

    /// Stops tracking a job and discards any pending update for it.
    ///
    /// Returns once the reporter has handled everything queued before, so no
    /// progress edit for the job can land after this.
    pub async fn finish(&self, job_id: &str) {
        let (ack, done) = oneshot::channel();
        let cmd = Command::Finish {
            job_id: job_id.to_string(),
            ack,
        };
        if self.tx.send(cmd).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Creates a sink that reports through this handle.
    pub fn sink(&self, job_id: &str, stage: Stage) -> ProgressSink {
        ProgressSink::attached(self.clone(), job_id, stage)
    }

    /// Stops the reporter task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

struct JobProgress {
    target: StatusTarget,
    shown: Option<(Instant, ProgressEvent)>,
    pending: Option<ProgressEvent>,
}

impl JobProgress {
    fn is_due(&self, now: Instant, interval: Duration) -> bool {
        match &self.shown {
            Some((at, _)) => now.duration_since(*at) >= interval,
            None => true,
        }
    }
}

/// Collapses progress events into at most one visible update per job and interval.
pub struct ProgressReporter<A: TransportAdapter + ?Sized> {
    config: ProgressConfig,
    transport: Arc<A>,
    jobs: HashMap<String, JobProgress>,
}

impl<A: TransportAdapter + ?Sized + 'static> ProgressReporter<A> {
    /// Spawns the reporter task and returns its handle.
    pub fn spawn(config: ProgressConfig, transport: Arc<A>) -> ProgressHandle {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let shutdown = CancellationToken::new();

        let reporter = Self {
            config,
            transport,
            jobs: HashMap::new(),
        };
        tokio::spawn(reporter.run(rx, shutdown.clone()));

        ProgressHandle { tx, shutdown }
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.config.update_interval_ms)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        let tick = Duration::from_millis((self.config.update_interval_ms / 4).clamp(50, 1000));
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = ticker.tick() => self.flush_due().await,
            }
        }

        debug!(tracked = self.jobs.len(), "Progress reporter stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Register { job_id, target } => {
                self.jobs.insert(
                    job_id,
                    JobProgress {
                        target,
                        shown: None,
                        pending: None,
                    },
                );
            }
            Command::Finish { job_id, ack } => {
                self.jobs.remove(&job_id);
                let _ = ack.send(());
            }
            Command::Report(event) => self.accept(event).await,
        }
    }

    async fn accept(&mut self, event: ProgressEvent) {
        let interval = self.interval();
        let min_delta = self.config.min_delta;
        let Some(state) = self.jobs.get_mut(&event.job_id) else {
            return;
        };

        if let Some((_, shown)) = &state.shown {
            if !event.is_new_step(shown) && event.fraction - shown.fraction < min_delta {
                return;
            }
        }

        if state.is_due(Instant::now(), interval) {
            state.pending = None;
            let target = state.target.clone();
            self.publish(&target, event).await;
        } else {
            state.pending = Some(event);
        }
    }

    async fn flush_due(&mut self) {
        let now = Instant::now();
        let interval = self.interval();
        let due: Vec<(StatusTarget, ProgressEvent)> = self
            .jobs
            .values_mut()
            .filter(|state| state.pending.is_some() && state.is_due(now, interval))
            .filter_map(|state| state.pending.take().map(|e| (state.target.clone(), e)))
            .collect();

        for (target, event) in due {
            self.publish(&target, event).await;
        }
    }

    async fn publish(&mut self, target: &StatusTarget, event: ProgressEvent) {
        let text = render_status(&event);
        if let Err(e) = self.transport.edit_status(target, &text).await {
            warn!(job_id = %event.job_id, error = %e, "Failed to update status message");
        }
        if let Some(state) = self.jobs.get_mut(&event.job_id) {
            state.shown = Some((Instant::now(), event));
        }
    }
}

/// Renders the visible status text for an event.
pub fn render_status(event: &ProgressEvent) -> String {
    let fraction = event.fraction.clamp(0.0, 1.0);
    let filled = ((fraction * BAR_WIDTH as f32).round() as usize).min(BAR_WIDTH);

    let mut text = String::from(event.stage.label());
    if let Some((index, total)) = event.output {
        text.push_str(&format!(" ({}/{})", index, total));
    }
    text.push_str("...\n[");
    text.push_str(&"█".repeat(filled));
    text.push_str(&"░".repeat(BAR_WIDTH - filled));
    text.push_str(&format!("] {:.0}%", fraction * 100.0));

    if let Some(eta) = event.eta_secs {
        text.push_str(&format!("\nETA: {}", format_eta(eta)));
    }
    text
}

/// Formats a duration in seconds as "1h 02m", "3m 05s" or "42s".
pub fn format_eta(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn event(stage: Stage, fraction: f32) -> ProgressEvent {
        ProgressEvent {
            job_id: "job-1".to_string(),
            stage,
            output: None,
            fraction,
            eta_secs: None,
        }
    }

    fn target() -> StatusTarget {
        StatusTarget::new("100", 7)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[test]
    fn test_render_status() {
        let mut e = event(Stage::Transcoding, 0.5);
        e.eta_secs = Some(65);
        e.output = Some((2, 3));
        let text = render_status(&e);
        assert_eq!(text, "Processing (2/3)...\n[█████░░░░░] 50%\nETA: 1m 05s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(42), "42s");
        assert_eq!(format_eta(185), "3m 05s");
        assert_eq!(format_eta(3720), "1h 02m");
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_are_rate_limited() {
        let transport = Arc::new(MockTransport::new());
        let handle = ProgressReporter::spawn(
            ProgressConfig::default().with_interval_ms(4000),
            transport.clone(),
        );
        handle.register("job-1", target()).await;

        handle.report(event(Stage::Downloading, 0.1));
        settle().await;
        handle.report(event(Stage::Downloading, 0.3));
        handle.report(event(Stage::Downloading, 0.5));
        settle().await;
        assert_eq!(transport.status_updates().len(), 1);

        tokio::time::sleep(Duration::from_millis(4100)).await;
        let updates = transport.status_updates();
        assert_eq!(updates.len(), 2);
        assert!(updates[1].1.contains("50%"));
        assert_eq!(updates[1].0, target());

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_deltas_dropped_unless_stage_changes() {
        let transport = Arc::new(MockTransport::new());
        let handle = ProgressReporter::spawn(
            ProgressConfig::default().with_interval_ms(1000).with_min_delta(0.05),
            transport.clone(),
        );
        handle.register("job-1", target()).await;

        handle.report(event(Stage::Downloading, 0.50));
        settle().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        handle.report(event(Stage::Downloading, 0.52));
        settle().await;
        assert_eq!(transport.status_updates().len(), 1);

        handle.report(event(Stage::Transcoding, 0.0));
        settle().await;
        let updates = transport.status_updates();
        assert_eq!(updates.len(), 2);
        assert!(updates[1].1.starts_with("Processing"));

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_discards_pending_and_unknown_jobs_are_ignored() {
        let transport = Arc::new(MockTransport::new());
        let handle = ProgressReporter::spawn(ProgressConfig::default(), transport.clone());

        handle.report(event(Stage::Downloading, 0.2));
        settle().await;
        assert!(transport.status_updates().is_empty());

        handle.register("job-1", target()).await;
        handle.report(event(Stage::Downloading, 0.2));
        handle.report(event(Stage::Downloading, 0.9));
        settle().await;
        handle.finish("job-1").await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.status_updates().len(), 1);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_feeds_reporter() {
        let transport = Arc::new(MockTransport::new());
        let handle = ProgressReporter::spawn(ProgressConfig::default(), transport.clone());
        handle.register("job-1", target()).await;

        let sink = handle.sink("job-1", Stage::Uploading);
        sink.emit(0.25, Some(30));
        settle().await;

        let updates = transport.status_updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].1.starts_with("Uploading"));
        assert!(updates[0].1.contains("ETA: 30s"));

        handle.shutdown();
    }
}
