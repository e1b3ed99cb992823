//! Error types for the storage module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing scratch space.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Job id cannot be used as a directory name.
    #[error("Invalid job id for scratch directory: {job_id}")]
    InvalidJobId { job_id: String },

    /// Scratch for this job is already held.
    #[error("Scratch already acquired for job {job_id}")]
    AlreadyAcquired { job_id: String },

    /// Failed to create a scratch directory.
    #[error("Failed to create scratch directory: {path}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove a scratch directory.
    #[error("Failed to remove scratch directory: {path}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
