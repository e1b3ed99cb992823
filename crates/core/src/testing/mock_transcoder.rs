//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::job::OutputSpec;
use crate::probe::MediaInfo;
use crate::progress::ProgressSink;
use crate::transcoder::{
    ContainerFormat, ExecutionPlan, PlanKind, TranscodeError, TranscodeOutput, Transcoder,
};

/// A recorded transcode for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTranscode {
    pub input: PathBuf,
    pub output: PathBuf,
    pub container: ContainerFormat,
    pub plan: PlanKind,
}

#[derive(Debug, Default)]
struct State {
    errors: VecDeque<TranscodeError>,
    failing: Vec<ContainerFormat>,
    delay: Duration,
    recorded: Vec<RecordedTranscode>,
}

/// Mock implementation of the Transcoder trait.
///
/// Selects a real [`ExecutionPlan`] for each call, then writes a small file
/// instead of running ffmpeg. A configured delay is spent in two halves with
/// progress in between; cancelling during the delay removes the partial file.
///
/// # Example
///
/// ```rust,ignore
/// use mediarelay_core::testing::MockTranscoder;
///
/// let transcoder = MockTranscoder::new();
/// transcoder.fail_container(ContainerFormat::Webm);
///
/// // ... run a job with an mp4 and a webm output ...
///
/// assert_eq!(transcoder.recorded().len(), 1);
/// ```
#[derive(Debug)]
pub struct MockTranscoder {
    state: Mutex<State>,
    runs: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            runs: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Queue an error for the next run.
    pub fn push_error(&self, error: TranscodeError) {
        self.state().errors.push_back(error);
    }

    /// Fail every run targeting this container.
    pub fn fail_container(&self, container: ContainerFormat) {
        self.state().failing.push(container);
    }

    /// Make each run take this long.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    /// Successful runs in completion order.
    pub fn recorded(&self) -> Vec<RecordedTranscode> {
        self.state().recorded.clone()
    }

    /// Number of run calls, including failed ones.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Most runs observed in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn produce(
        &self,
        input: &Path,
        output: &Path,
        spec: &OutputSpec,
        info: &MediaInfo,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let started = Instant::now();
        let (error, delay) = {
            let mut state = self.state();
            let error = state.errors.pop_front().or_else(|| {
                state.failing.contains(&spec.container).then(|| {
                    TranscodeError::failed(Some(1), format!("{} encoder crashed", spec.container.extension()))
                })
            });
            (error, state.delay)
        };
        if let Some(error) = error {
            return Err(error);
        }

        let plan = ExecutionPlan::select(spec, info, 0.0)?;
        if !input.exists() {
            return Err(TranscodeError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        tokio::fs::write(output, b"partial").await?;
        for fraction in [0.5, 1.0] {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = tokio::fs::remove_file(output).await;
                    return Err(TranscodeError::Cancelled);
                }
                _ = tokio::time::sleep(delay / 2) => {}
            }
            progress.emit(fraction, None);
        }

        let body = format!("{}:{}", plan.kind.as_str(), spec.container.extension());
        tokio::fs::write(output, body.as_bytes()).await?;

        self.state().recorded.push(RecordedTranscode {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            container: spec.container,
            plan: plan.kind,
        });
        Ok(TranscodeOutput {
            path: output.to_path_buf(),
            size_bytes: body.len() as u64,
            plan: plan.kind,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(
        &self,
        input: &Path,
        output: &Path,
        spec: &OutputSpec,
        info: &MediaInfo,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TranscodeOutput, TranscodeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = self.produce(input, output, spec, info, progress, cancel).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}
