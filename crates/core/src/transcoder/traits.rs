//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::job::OutputSpec;
use crate::probe::MediaInfo;
use crate::progress::ProgressSink;

use super::error::TranscodeError;
use super::types::TranscodeOutput;

/// Produces one output file from one probed input.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Transcodes `input` into `output` according to `spec`.
    ///
    /// On cancellation or timeout the child process is killed and any partial
    /// output is removed before returning.
    async fn run(
        &self,
        input: &Path,
        output: &Path,
        spec: &OutputSpec,
        info: &MediaInfo,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TranscodeOutput, TranscodeError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscodeError>;
}
