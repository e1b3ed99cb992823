//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scheduler (submissions, queue depth, running jobs, outcomes)
//! - Pipeline (stage durations, retries)
//! - Transcoder (plan selection)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Job submissions by result.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarelay_jobs_submitted_total", "Total job submissions"),
        &["result"], // "accepted", "capacity_global", "capacity_user", "duplicate", "invalid"
    )
    .unwrap()
});

/// Finished jobs by outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarelay_jobs_finished_total", "Total jobs reaching a terminal state"),
        &["outcome"], // "done", "failed", "cancelled"
    )
    .unwrap()
});

/// Jobs waiting for a worker.
pub static JOBS_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mediarelay_jobs_queued", "Jobs waiting for a worker").unwrap()
});

/// Jobs currently held by a worker.
pub static JOBS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mediarelay_jobs_running", "Jobs currently running").unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("mediarelay_stage_duration_seconds", "Duration of pipeline stages")
            .buckets(vec![
                0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0,
            ]),
        &["stage", "result"], // result: "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Retry attempts by stage.
pub static RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarelay_retries_total", "Total retried stage attempts"),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Transcoder Metrics
// =============================================================================

/// Outputs produced by plan kind.
pub static TRANSCODE_PLANS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarelay_transcode_plans_total", "Outputs produced by plan kind"),
        &["plan"], // "remux", "encode", "thumbnail"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOBS_QUEUED.clone()),
        Box::new(JOBS_RUNNING.clone()),
        // Pipeline
        Box::new(STAGE_DURATION.clone()),
        Box::new(RETRIES.clone()),
        // Transcoder
        Box::new(TRANSCODE_PLANS.clone()),
    ]
}
