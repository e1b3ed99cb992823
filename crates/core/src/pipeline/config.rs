//! Configuration for the pipeline module.

use serde::{Deserialize, Serialize};

/// How the outputs of one job are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Transcode and upload one output at a time.
    #[default]
    Sequential,
    /// Transcode up to `max_parallel` outputs at once, then upload in order.
    Parallel,
}

/// Multi-output behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPolicy {
    #[serde(default)]
    pub mode: OutputMode,

    /// Concurrent transcodes in parallel mode.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Stop the remaining outputs after the first failure.
    #[serde(default)]
    pub fail_fast: bool,
}

/// Configuration for the pipeline orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for one download attempt in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Deadline for one upload attempt in seconds.
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,

    /// Caption added to delivered outputs that have none.
    #[serde(default)]
    pub default_caption: Option<String>,

    /// Attach a still frame to outputs sent as video.
    #[serde(default = "default_video_thumbnails")]
    pub video_thumbnails: bool,

    #[serde(default)]
    pub output: OutputPolicy,
}

fn default_max_parallel() -> usize {
    2
}

fn default_video_thumbnails() -> bool {
    true
}

fn default_download_timeout() -> u64 {
    600
}

fn default_upload_timeout() -> u64 {
    900
}

impl Default for OutputPolicy {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            max_parallel: default_max_parallel(),
            fail_fast: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout(),
            upload_timeout_secs: default_upload_timeout(),
            default_caption: None,
            video_thumbnails: default_video_thumbnails(),
            output: OutputPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_output_policy(mut self, policy: OutputPolicy) -> Self {
        self.output = policy;
        self
    }

    pub fn with_video_thumbnails(mut self, enabled: bool) -> Self {
        self.video_thumbnails = enabled;
        self
    }

    pub fn with_timeouts(mut self, download_secs: u64, upload_secs: u64) -> Self {
        self.download_timeout_secs = download_secs;
        self.upload_timeout_secs = upload_secs;
        self
    }
}

impl OutputPolicy {
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn parallel(max_parallel: usize) -> Self {
        Self {
            mode: OutputMode::Parallel,
            max_parallel,
            fail_fast: false,
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}
