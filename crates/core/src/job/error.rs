//! Error types for the job module.

use thiserror::Error;

use super::types::JobStatus;

/// Errors raised by the job model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    /// The state machine does not allow this edge.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// The request cannot be turned into a job.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl JobError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}
