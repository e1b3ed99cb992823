//! Error types for the scheduler module.

use serde::Serialize;
use thiserror::Error;

use crate::job::{JobError, JobStatus};

/// Which admission ceiling was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityScope {
    Global,
    PerUser,
}

impl CapacityScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::PerUser => "per_user",
        }
    }
}

impl std::fmt::Display for CapacityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the scheduler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// Too many jobs in flight.
    #[error("Capacity exceeded ({scope} limit of {limit})")]
    CapacityExceeded { scope: CapacityScope, limit: usize },

    /// The requester already has this input in flight.
    #[error("Duplicate request: job {job_id} is already processing this input")]
    Duplicate { job_id: String },

    /// Request failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Scheduler is not accepting work.
    #[error("Scheduler is not running")]
    NotRunning,

    /// Unknown job id.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The job already reached a terminal state.
    #[error("Job {job_id} already finished ({status})")]
    AlreadyFinished { job_id: String, status: JobStatus },
}

impl From<JobError> for SchedulerError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidRequest(reason) => Self::InvalidRequest(reason),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SchedulerError::CapacityExceeded {
            scope: CapacityScope::PerUser,
            limit: 3,
        };
        assert_eq!(err.to_string(), "Capacity exceeded (per_user limit of 3)");

        let err = SchedulerError::AlreadyFinished {
            job_id: "j".to_string(),
            status: JobStatus::Done,
        };
        assert_eq!(err.to_string(), "Job j already finished (done)");
    }

    #[test]
    fn test_from_job_error() {
        let err: SchedulerError = JobError::invalid("outputs must not be empty").into();
        assert_eq!(
            err,
            SchedulerError::InvalidRequest("outputs must not be empty".to_string())
        );
    }
}
