//! Configuration for the probe module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which metadata tool backs the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeBackend {
    /// `ffprobe -print_format json`
    #[default]
    Ffprobe,
    /// `mediainfo --Output=JSON`
    Mediainfo,
}

/// Configuration for media probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Tool used for probing.
    #[serde(default)]
    pub backend: ProbeBackend,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Path to mediainfo binary.
    #[serde(default = "default_mediainfo_path")]
    pub mediainfo_path: PathBuf,

    /// Deadline for a single probe in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_mediainfo_path() -> PathBuf {
    PathBuf::from("mediainfo")
}

fn default_timeout() -> u64 {
    30
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            backend: ProbeBackend::default(),
            ffprobe_path: default_ffprobe_path(),
            mediainfo_path: default_mediainfo_path(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ProbeConfig {
    /// Sets the probe deadline in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.backend, ProbeBackend::Ffprobe);
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_deserialize_mediainfo_backend() {
        let toml = r#"
            backend = "mediainfo"
            mediainfo_path = "/usr/bin/mediainfo"
        "#;
        let config: ProbeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.backend, ProbeBackend::Mediainfo);
        assert_eq!(config.mediainfo_path, PathBuf::from("/usr/bin/mediainfo"));
        assert_eq!(config.timeout_secs, 30);
    }
}
