//! Configuration for scratch storage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the scratch arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per running job.
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,

    /// Orphaned job directories older than this are removed at startup.
    #[serde(default = "default_orphan_age")]
    pub orphan_max_age_secs: u64,
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("mediarelay")
}

fn default_orphan_age() -> u64 {
    3600 // 1 hour
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            orphan_max_age_secs: default_orphan_age(),
        }
    }
}

impl StorageConfig {
    /// Creates a config rooted at `scratch_root`.
    pub fn with_root(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            ..Default::default()
        }
    }

    /// Sets the orphan age threshold.
    pub fn with_orphan_max_age(mut self, secs: u64) -> Self {
        self.orphan_max_age_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert!(config.scratch_root.ends_with("mediarelay"));
        assert_eq!(config.orphan_max_age_secs, 3600);
    }

    #[test]
    fn test_config_from_toml() {
        let config: StorageConfig =
            toml::from_str(r#"scratch_root = "/var/lib/mediarelay/scratch""#).unwrap();
        assert_eq!(config.scratch_root, PathBuf::from("/var/lib/mediarelay/scratch"));
        assert_eq!(config.orphan_max_age_secs, 3600);
    }
}
