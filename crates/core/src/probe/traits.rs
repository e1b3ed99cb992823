//! Trait definitions for the probe module.

use async_trait::async_trait;
use std::path::Path;

use super::error::ProbeError;
use super::types::MediaInfo;

/// Extracts structured track and container information from a media file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Returns the name of this probe implementation.
    fn name(&self) -> &str;

    /// Probes a media file.
    ///
    /// Fails with [`ProbeError::UnreadableMedia`] when the file cannot be parsed
    /// and [`ProbeError::Timeout`] when the tool exceeds its deadline.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;

    /// Validates that the underlying tool is available.
    async fn validate(&self) -> Result<(), ProbeError>;
}
