//! Error types for the pipeline module.

use thiserror::Error;

use crate::job::{FailureKind, JobError, JobFailure};
use crate::probe::ProbeError;
use crate::progress::Stage;
use crate::storage::StorageError;
use crate::transcoder::TranscodeError;
use crate::transport::{TransportError, TransportErrorKind};

/// Anything that can stop a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Job(#[from] JobError),

    /// The job's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether this error is the result of cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Transport(e) => e.is_cancelled(),
            Self::Transcode(TranscodeError::Cancelled) => true,
            _ => false,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(e) if e.kind == TransportErrorKind::Timeout => FailureKind::Timeout,
            Self::Transport(_) => FailureKind::Transport,
            Self::Probe(ProbeError::UnreadableMedia { .. }) => FailureKind::UnreadableMedia,
            Self::Probe(ProbeError::Timeout { .. }) => FailureKind::Timeout,
            Self::Probe(_) => FailureKind::Internal,
            Self::Transcode(TranscodeError::UnsupportedOutputSpec { .. }) => FailureKind::Unsupported,
            Self::Transcode(TranscodeError::Failed { .. }) => FailureKind::Transcode,
            Self::Transcode(TranscodeError::Timeout { .. }) => FailureKind::Timeout,
            Self::Transcode(_) => FailureKind::Internal,
            Self::Storage(_) => FailureKind::Storage,
            Self::Job(_) | Self::Cancelled => FailureKind::Internal,
        }
    }

    /// Text shown to the requester. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(e) => match e.kind {
                TransportErrorKind::TooLarge => "the file is too large for the platform".to_string(),
                TransportErrorKind::NotFound => "the file is no longer available".to_string(),
                TransportErrorKind::Forbidden => "access to the chat or file was denied".to_string(),
                TransportErrorKind::Timeout => "the transfer timed out".to_string(),
                TransportErrorKind::RateLimited => "the platform is rate limiting us".to_string(),
                _ => "the transfer failed".to_string(),
            },
            Self::Probe(ProbeError::UnreadableMedia { .. }) => {
                "the file is not a readable media file".to_string()
            }
            Self::Probe(ProbeError::Timeout { .. }) => "analysing the file took too long".to_string(),
            Self::Transcode(TranscodeError::UnsupportedOutputSpec { reason }) => reason.clone(),
            Self::Transcode(TranscodeError::Failed { message, .. }) => message.clone(),
            Self::Transcode(TranscodeError::Timeout { .. }) => "processing took too long".to_string(),
            Self::Cancelled => "cancelled".to_string(),
            _ => "internal error".to_string(),
        }
    }

    /// Classifies this error into a failure at `stage`.
    pub fn to_failure(&self, stage: Stage) -> JobFailure {
        JobFailure::new(stage, self.kind(), self.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_classification() {
        let err = PipelineError::from(TransportError::timeout("slow"));
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(!err.is_cancelled());

        let err = PipelineError::from(ProbeError::unreadable("moov atom not found"));
        let failure = err.to_failure(Stage::Probing);
        assert_eq!(failure.kind, FailureKind::UnreadableMedia);
        assert_eq!(failure.stage, Stage::Probing);
        assert!(!failure.message.contains("moov"));

        let err = PipelineError::from(TranscodeError::unsupported("no video stream"));
        assert_eq!(err.to_failure(Stage::Transcoding).message, "no video stream");
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = PipelineError::from(ProbeError::ToolNotFound {
            path: PathBuf::from("/opt/secret/ffprobe"),
        });
        assert_eq!(err.kind(), FailureKind::Internal);
        assert_eq!(err.user_message(), "internal error");
    }

    #[test]
    fn test_cancellation_detected() {
        assert!(PipelineError::from(TranscodeError::Cancelled).is_cancelled());
        assert!(PipelineError::from(TransportError::cancelled()).is_cancelled());
        assert!(PipelineError::Cancelled.is_cancelled());
    }
}
