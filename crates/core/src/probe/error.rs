//! Error types for the probe module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing a media file.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Probe binary not found.
    #[error("probe tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Input file not found.
    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The tool could not make sense of the file (corrupt or unsupported).
    #[error("unreadable media: {reason}")]
    UnreadableMedia { reason: String },

    /// The tool did not finish within the deadline.
    #[error("probe timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while running the tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Creates a new unreadable media error.
    pub fn unreadable(reason: impl Into<String>) -> Self {
        Self::UnreadableMedia {
            reason: reason.into(),
        }
    }

    /// Probing is deterministic for a given file, so nothing here is retried.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
