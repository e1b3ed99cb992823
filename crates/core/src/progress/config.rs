//! Configuration for the progress reporter.

use serde::{Deserialize, Serialize};

/// Configuration for progress reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Minimum time between two visible updates of the same job.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Minimum fraction change for a visible update within the same stage.
    #[serde(default = "default_min_delta")]
    pub min_delta: f32,

    /// Capacity of the reporter's inbox. Reports are dropped when it is full.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_update_interval_ms() -> u64 {
    4000
}

fn default_min_delta() -> f32 {
    0.02
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            min_delta: default_min_delta(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ProgressConfig {
    /// Sets the update interval in milliseconds.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.update_interval_ms = interval_ms;
        self
    }

    /// Sets the minimum visible delta.
    pub fn with_min_delta(mut self, min_delta: f32) -> Self {
        self.min_delta = min_delta;
        self
    }
}
