//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during transcoding.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The output cannot be produced from this input with this toolchain.
    #[error("Unsupported output: {reason}")]
    UnsupportedOutputSpec { reason: String },

    /// FFmpeg ran and failed.
    #[error("Transcode failed (exit code {exit_code:?}): {message}")]
    Failed {
        exit_code: Option<i32>,
        message: String,
    },

    /// Transcode timed out.
    #[error("Transcode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Job was cancelled.
    #[error("Transcode cancelled")]
    Cancelled,

    /// I/O error during transcoding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Creates a new unsupported output error.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedOutputSpec {
            reason: reason.into(),
        }
    }

    /// Creates a new failure error.
    pub fn failed(exit_code: Option<i32>, message: impl Into<String>) -> Self {
        Self::Failed {
            exit_code,
            message: message.into(),
        }
    }

    /// Whether this error is retryable. Only timeouts are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(TranscodeError::Timeout { timeout_secs: 5 }.is_retryable());
        assert!(!TranscodeError::failed(Some(1), "boom").is_retryable());
        assert!(!TranscodeError::Cancelled.is_retryable());
        assert!(!TranscodeError::unsupported("no encoder").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = TranscodeError::failed(Some(234), "Invalid data found when processing input");
        assert_eq!(
            err.to_string(),
            "Transcode failed (exit code Some(234)): Invalid data found when processing input"
        );
    }
}
