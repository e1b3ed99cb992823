//! Configuration for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Deadline for a single ffmpeg run in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional global ffmpeg arguments, placed before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// Minimum time between two forwarded progress events.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Where in the input thumbnails are taken, in seconds.
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset_secs: f64,

    /// Longest edge of a thumbnail in pixels.
    #[serde(default = "default_thumbnail_max_size")]
    pub thumbnail_max_size: u32,

    /// Number of stderr lines kept for error messages.
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,

    /// Longest error message surfaced to callers, in characters.
    #[serde(default = "default_max_error_len")]
    pub max_error_len: usize,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_progress_interval_ms() -> u64 {
    1000
}

fn default_thumbnail_offset() -> f64 {
    3.0
}

fn default_thumbnail_max_size() -> u32 {
    320
}

fn default_stderr_tail_lines() -> usize {
    20
}

fn default_max_error_len() -> usize {
    300
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_timeout(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
            progress_interval_ms: default_progress_interval_ms(),
            thumbnail_offset_secs: default_thumbnail_offset(),
            thumbnail_max_size: default_thumbnail_max_size(),
            stderr_tail_lines: default_stderr_tail_lines(),
            max_error_len: default_max_error_len(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a new config with a custom ffmpeg path.
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the progress interval in milliseconds.
    pub fn with_progress_interval_ms(mut self, interval_ms: u64) -> Self {
        self.progress_interval_ms = interval_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranscoderConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.timeout_secs, 3600);
        assert_eq!(config.thumbnail_max_size, 320);
        assert!((config.thumbnail_offset_secs - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_builder() {
        let config = TranscoderConfig::with_ffmpeg_path(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
            .with_timeout(60)
            .with_progress_interval_ms(250);

        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.progress_interval_ms, 250);
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: TranscoderConfig = toml::from_str("timeout_secs = 120").unwrap();
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.ffmpeg_log_level, "error");
    }
}
