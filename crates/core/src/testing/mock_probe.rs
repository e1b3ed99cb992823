//! Mock media probe for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::probe::{MediaInfo, MediaProbe, ProbeError};

use super::fixtures;

/// Mock implementation of the MediaProbe trait.
///
/// Returns a configurable [`MediaInfo`] for any existing file, or a queued
/// error.
#[derive(Debug)]
pub struct MockProbe {
    info: Mutex<MediaInfo>,
    errors: Mutex<VecDeque<ProbeError>>,
    probes: AtomicUsize,
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProbe {
    /// A probe reporting a 60 s 720p H.264/AAC MP4.
    pub fn new() -> Self {
        Self::with_info(fixtures::video_info())
    }

    pub fn with_info(info: MediaInfo) -> Self {
        Self {
            info: Mutex::new(info),
            errors: Mutex::new(VecDeque::new()),
            probes: AtomicUsize::new(0),
        }
    }

    fn info(&self) -> MutexGuard<'_, MediaInfo> {
        self.info.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Replace the reported info.
    pub fn set_info(&self, info: MediaInfo) {
        *self.info() = info;
    }

    /// Queue an error for the next probe.
    pub fn push_error(&self, error: ProbeError) {
        self.errors
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(error);
    }

    /// Number of probe calls.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProbe for MockProbe {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let queued = self
            .errors
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        if let Some(error) = queued {
            return Err(error);
        }

        let metadata = tokio::fs::metadata(path).await.map_err(|_| ProbeError::InputNotFound {
            path: path.to_path_buf(),
        })?;

        let mut info = self.info().clone();
        info.path = path.to_path_buf();
        info.size_bytes = metadata.len();
        Ok(info)
    }

    async fn validate(&self) -> Result<(), ProbeError> {
        Ok(())
    }
}
