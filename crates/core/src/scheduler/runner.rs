//! Worker pool and job table.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::job::{
    admit, validate_request, FailureKind, Job, JobError, JobFailure, JobRequest, JobStatus,
};
use crate::metrics;
use crate::progress::Stage;

use super::admission::{AdmissionPermit, AdmissionState};
use super::config::SchedulerConfig;
use super::error::{CapacityScope, SchedulerError};
use super::queue::JobQueue;
use super::retry::RetryPolicy;

/// Runs one dispatched job to a terminal state.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    /// Rejects requests this executor can never fulfil. Called on submission.
    fn check(&self, _request: &JobRequest) -> Result<(), String> {
        Ok(())
    }

    /// Drives the job and returns it in a terminal state.
    async fn execute(&self, ctx: JobContext) -> Job;
}

/// Everything an executor gets for one job.
pub struct JobContext {
    /// The executor's own copy of the job.
    pub job: Job,
    /// Fired by `Scheduler::cancel` and on shutdown.
    pub cancel: CancellationToken,
    /// Backoff for transient stage failures.
    pub retry: RetryPolicy,
    publisher: Publisher,
}

impl JobContext {
    /// Moves the job to `next` and publishes the change.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        self.job.transition(next)?;
        self.publish();
        Ok(())
    }

    /// Records that progress was made.
    pub fn touch_progress(&mut self) {
        self.job.last_progress_at = Some(Utc::now());
    }

    /// Makes the current job state visible to `Scheduler::job` and handles.
    pub fn publish(&self) {
        self.publisher.publish(&self.job);
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job.id)
            .field("status", &self.job.status)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[derive(Clone)]
struct Publisher {
    shared: Arc<Shared>,
}

impl Publisher {
    fn publish(&self, job: &Job) {
        let mut state = self.shared.state();
        if let Some(entry) = state.jobs.get_mut(&job.id) {
            // Terminal snapshots are only written by the worker on completion.
            if !entry.job.status.is_terminal() {
                entry.job = job.clone();
                entry.status.send_replace(job.status);
            }
        }
    }
}

/// Caller's view of a submitted job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: String,
    status: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Latest published status.
    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    /// Waits for the next status change.
    pub async fn changed(&mut self) -> Option<JobStatus> {
        self.status.changed().await.ok()?;
        Some(*self.status.borrow_and_update())
    }

    /// Waits until the job is terminal.
    pub async fn wait(&mut self) -> JobStatus {
        let done = match self.status.wait_for(|s| s.is_terminal()).await {
            Ok(status) => Some(*status),
            Err(_) => None,
        };
        done.unwrap_or_else(|| *self.status.borrow())
    }
}

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub workers: usize,
    pub queued: usize,
    pub active: usize,
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub per_user_limit: usize,
    pub finished: usize,
}

struct JobEntry {
    job: Job,
    cancel: CancellationToken,
    status: watch::Sender<JobStatus>,
    permit: Option<AdmissionPermit>,
}

#[derive(Default)]
struct State {
    queue: JobQueue,
    jobs: HashMap<String, JobEntry>,
    finished: VecDeque<String>,
    active: usize,
}

struct Shared {
    state: Mutex<State>,
    notify: Notify,
    history_limit: usize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a terminal job, returns its slot and trims history.
    fn finish(&self, mut job: Job) {
        if !job.status.is_terminal() {
            let failure = JobFailure::new(
                Stage::Transcoding,
                FailureKind::Internal,
                format!("executor returned job in state {}", job.status),
            );
            warn!(job_id = %job.id, status = %job.status, "Executor returned a non-terminal job");
            job.error.get_or_insert(failure);
            // Force the terminal state; the edge is always legal from a running state.
            if job.transition(JobStatus::Failed).is_err() {
                job.status = JobStatus::Failed;
            }
        }

        metrics::JOBS_FINISHED
            .with_label_values(&[job.status.as_str()])
            .inc();

        let mut state = self.state();
        let status = job.status;
        let id = job.id.clone();
        if let Some(entry) = state.jobs.get_mut(&id) {
            entry.job = job;
            entry.permit.take();
            entry.status.send_replace(status);
        }
        state.finished.push_back(id);
        while state.finished.len() > self.history_limit {
            if let Some(old) = state.finished.pop_front() {
                state.jobs.remove(&old);
            }
        }
    }
}

struct Dispatch {
    job: Job,
    cancel: CancellationToken,
}

/// Admission control plus a fixed pool of workers.
pub struct Scheduler<E: JobExecutor> {
    config: SchedulerConfig,
    executor: Arc<E>,
    admission: Arc<AdmissionState>,
    retry: RetryPolicy,
    shared: Arc<Shared>,
    running: AtomicBool,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<E: JobExecutor> Scheduler<E> {
    pub fn new(config: SchedulerConfig, executor: Arc<E>) -> Self {
        let admission = AdmissionState::new(config.max_in_flight, config.per_user_limit);
        let retry = RetryPolicy::from(&config.retry);
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            history_limit: config.history_limit,
        });
        Self {
            config,
            executor,
            admission,
            retry,
            shared,
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the worker pool.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        let count = self.config.workers.max(1);
        let mut workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
        for index in 0..count {
            let shared = Arc::clone(&self.shared);
            let executor = Arc::clone(&self.executor);
            let retry = self.retry.clone();
            let shutdown = self.shutdown.clone();
            workers.push(tokio::spawn(worker_loop(
                index, shared, executor, retry, shutdown,
            )));
        }
        info!(workers = count, "Scheduler started");
    }

    /// Stops accepting work, cancels every job and waits for workers.
    pub async fn stop(&self, grace: Duration) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping scheduler");

        let queued: Vec<String> = {
            let mut state = self.shared.state();
            for entry in state.jobs.values() {
                if !entry.job.status.is_terminal() {
                    entry.cancel.cancel();
                }
            }
            state.queue.drain()
        };
        metrics::JOBS_QUEUED.set(0);
        for job_id in queued {
            self.cancel_queued(&job_id);
        }

        self.shutdown.cancel();
        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().unwrap_or_else(|p| p.into_inner());
            guard.drain(..).collect()
        };
        let join_all = futures::future::join_all(workers);
        if tokio::time::timeout(grace, join_all).await.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "Workers did not stop in time");
        }
        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Admits a request and queues it for dispatch.
    pub fn submit(&self, request: JobRequest) -> Result<JobHandle, SchedulerError> {
        let result = self.try_submit(request);
        let label = match &result {
            Ok(_) => "accepted",
            Err(SchedulerError::CapacityExceeded { scope, .. }) => match scope {
                CapacityScope::Global => "capacity_global",
                CapacityScope::PerUser => "capacity_user",
            },
            Err(SchedulerError::Duplicate { .. }) => "duplicate",
            Err(SchedulerError::NotRunning) => "not_running",
            Err(_) => "invalid",
        };
        metrics::JOBS_SUBMITTED.with_label_values(&[label]).inc();
        result
    }

    fn try_submit(&self, request: JobRequest) -> Result<JobHandle, SchedulerError> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        validate_request(&request)?;
        self.executor
            .check(&request)
            .map_err(SchedulerError::InvalidRequest)?;
        let job = admit(request)?;

        let mut state = self.shared.state();

        if let Some(existing) = state.jobs.values().find(|e| {
            !e.job.status.is_terminal()
                && e.job.requester == job.requester
                && e.job.input.locator == job.input.locator
        }) {
            return Err(SchedulerError::Duplicate {
                job_id: existing.job.id.clone(),
            });
        }

        let permit = self.admission.try_acquire(&job.requester)?;
        let (status_tx, status_rx) = watch::channel(job.status);
        let job_id = job.id.clone();
        let priority = job.priority;

        info!(
            job_id = %job_id,
            requester = %job.requester,
            outputs = job.outputs.len(),
            priority = priority.as_str(),
            "Job queued"
        );

        state.jobs.insert(
            job_id.clone(),
            JobEntry {
                job,
                cancel: self.shutdown.child_token(),
                status: status_tx,
                permit: Some(permit),
            },
        );
        state.queue.push(job_id.clone(), priority);
        metrics::JOBS_QUEUED.set(state.queue.len() as i64);
        drop(state);

        self.shared.notify.notify_one();

        Ok(JobHandle {
            job_id,
            status: status_rx,
        })
    }

    /// Cancels a queued or running job.
    pub fn cancel(&self, job_id: &str) -> Result<(), SchedulerError> {
        let mut state = self.shared.state();
        let entry = state
            .jobs
            .get(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        if entry.job.status.is_terminal() {
            return Err(SchedulerError::AlreadyFinished {
                job_id: job_id.to_string(),
                status: entry.job.status,
            });
        }
        let token = entry.cancel.clone();

        if state.queue.remove(job_id) {
            metrics::JOBS_QUEUED.set(state.queue.len() as i64);
            drop(state);
            self.cancel_queued(job_id);
            return Ok(());
        }

        drop(state);
        info!(job_id = %job_id, "Cancelling running job");
        token.cancel();
        Ok(())
    }

    /// Marks a job that never reached a worker as cancelled.
    fn cancel_queued(&self, job_id: &str) {
        let job = {
            let state = self.shared.state();
            match state.jobs.get(job_id) {
                Some(entry) => {
                    entry.cancel.cancel();
                    entry.job.clone()
                }
                None => return,
            }
        };
        let mut job = job;
        if job.transition(JobStatus::Cancelled).is_ok() {
            info!(job_id = %job_id, "Queued job cancelled");
            self.shared.finish(job);
        }
    }

    /// Snapshot of one job.
    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.shared.state().jobs.get(job_id).map(|e| e.job.clone())
    }

    /// Snapshots of all known jobs, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .shared
            .state()
            .jobs
            .values()
            .map(|e| e.job.clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// A handle for an existing job.
    pub fn handle(&self, job_id: &str) -> Option<JobHandle> {
        self.shared.state().jobs.get(job_id).map(|e| JobHandle {
            job_id: job_id.to_string(),
            status: e.status.subscribe(),
        })
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.shared.state();
        SchedulerStatus {
            running: self.is_running(),
            workers: self.config.workers.max(1),
            queued: state.queue.len(),
            active: state.active,
            in_flight: self.admission.in_flight(),
            max_in_flight: self.admission.global_limit(),
            per_user_limit: self.admission.per_user_limit(),
            finished: state.finished.len(),
        }
    }

    /// In-flight count for one requester.
    pub fn user_in_flight(&self, requester: &str) -> usize {
        self.admission.user_in_flight(requester)
    }
}

/// Pops the next queued job, or `None` when the queue is empty.
fn next_dispatch(shared: &Shared) -> Option<Dispatch> {
    let mut state = shared.state();
    while let Some(job_id) = state.queue.pop() {
        metrics::JOBS_QUEUED.set(state.queue.len() as i64);
        if let Some(entry) = state.jobs.get(&job_id) {
            if entry.job.status.is_terminal() {
                continue;
            }
            let dispatch = Dispatch {
                job: entry.job.clone(),
                cancel: entry.cancel.clone(),
            };
            state.active += 1;
            metrics::JOBS_RUNNING.set(state.active as i64);
            return Some(dispatch);
        }
    }
    None
}

async fn worker_loop<E: JobExecutor>(
    index: usize,
    shared: Arc<Shared>,
    executor: Arc<E>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
) {
    debug!(worker = index, "Worker started");
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let Some(dispatch) = next_dispatch(&shared) else {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = shared.notify.notified() => {}
            }
            continue;
        };

        let job_id = dispatch.job.id.clone();
        let fallback = dispatch.job.clone();
        let ctx = JobContext {
            job: dispatch.job,
            cancel: dispatch.cancel,
            retry: retry.clone(),
            publisher: Publisher {
                shared: Arc::clone(&shared),
            },
        };

        debug!(worker = index, job_id = %job_id, "Dispatching job");
        let span = info_span!("job", job_id = %job_id);
        let exec = Arc::clone(&executor);
        let task = tokio::spawn(async move { exec.execute(ctx).await }.instrument(span));

        let job = match task.await {
            Ok(job) => job,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job task aborted");
                let mut job = fallback;
                job.error = Some(JobFailure::new(
                    Stage::Transcoding,
                    FailureKind::Internal,
                    "internal error while processing the job",
                ));
                job.status = JobStatus::Failed;
                job
            }
        };

        {
            let mut state = shared.state();
            state.active = state.active.saturating_sub(1);
            metrics::JOBS_RUNNING.set(state.active as i64);
        }
        shared.finish(job);
    }
    debug!(worker = index, "Worker stopped");
}
