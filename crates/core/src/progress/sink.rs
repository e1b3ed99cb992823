//! Per-stage progress sink handed to the transcoder and transport.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::reporter::ProgressHandle;
use super::types::{ProgressEvent, Stage};

const SCALE: f32 = 10_000.0;

#[derive(Clone)]
enum SinkTarget {
    Disabled,
    Reporter(ProgressHandle),
    Channel(mpsc::UnboundedSender<ProgressEvent>),
}

/// Emits progress for one stage of one job.
///
/// Fractions are clamped to [0, 1] and only forwarded when they grow, so a
/// sink never reports a value below one it already reported. Clones share
/// that high-water mark.
#[derive(Clone)]
pub struct ProgressSink {
    job_id: Arc<str>,
    stage: Stage,
    output: Option<(usize, usize)>,
    target: SinkTarget,
    // Highest forwarded fraction in ten-thousandths, plus one; zero means none yet.
    high_water: Arc<AtomicU32>,
}

impl ProgressSink {
    fn with_target(job_id: &str, stage: Stage, target: SinkTarget) -> Self {
        Self {
            job_id: Arc::from(job_id),
            stage,
            output: None,
            target,
            high_water: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self::with_target("", Stage::Transcoding, SinkTarget::Disabled)
    }

    /// A sink that forwards accepted events into a channel.
    pub fn channel(job_id: &str, stage: Stage) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_target(job_id, stage, SinkTarget::Channel(tx)), rx)
    }

    pub(super) fn attached(handle: ProgressHandle, job_id: &str, stage: Stage) -> Self {
        Self::with_target(job_id, stage, SinkTarget::Reporter(handle))
    }

    /// Tags events with the output position within a multi-output job.
    pub fn for_output(mut self, index: usize, total: usize) -> Self {
        if total > 1 {
            self.output = Some((index + 1, total));
        }
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Highest fraction forwarded so far.
    pub fn last_fraction(&self) -> Option<f32> {
        match self.high_water.load(Ordering::Acquire) {
            0 => None,
            v => Some((v - 1) as f32 / SCALE),
        }
    }

    /// Reports a fraction. Returns whether the event was forwarded.
    pub fn emit(&self, fraction: f32, eta_secs: Option<u64>) -> bool {
        if !fraction.is_finite() {
            return false;
        }
        let scaled = (fraction.clamp(0.0, 1.0) * SCALE).round() as u32 + 1;
        let previous = self.high_water.fetch_max(scaled, Ordering::AcqRel);
        if previous >= scaled {
            return false;
        }

        let event = ProgressEvent {
            job_id: self.job_id.to_string(),
            stage: self.stage,
            output: self.output,
            fraction: (scaled - 1) as f32 / SCALE,
            eta_secs,
        };

        match &self.target {
            SinkTarget::Disabled => {}
            SinkTarget::Reporter(handle) => handle.report(event),
            SinkTarget::Channel(tx) => {
                let _ = tx.send(event);
            }
        }
        true
    }

    /// Marks the stage complete.
    pub fn complete(&self) {
        self.emit(1.0, Some(0));
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink")
            .field("job_id", &self.job_id)
            .field("stage", &self.stage)
            .field("output", &self.output)
            .field("last_fraction", &self.last_fraction())
            .finish()
    }
}
