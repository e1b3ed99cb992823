//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for admission control and the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of jobs running at once.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Queued plus running jobs across all requesters.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Queued plus running jobs for a single requester.
    #[serde(default = "default_per_user_limit")]
    pub per_user_limit: usize,

    /// Finished jobs kept for status queries.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Backoff for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Growth factor between retries.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for a single delay (milliseconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_workers() -> usize {
    2
}

fn default_max_in_flight() -> usize {
    32
}

fn default_per_user_limit() -> usize {
    3
}

fn default_history_limit() -> usize {
    500
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000 // 1 second
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> u64 {
    30_000 // 30 seconds
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_in_flight: default_max_in_flight(),
            per_user_limit: default_per_user_limit(),
            history_limit: default_history_limit(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl SchedulerConfig {
    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the global and per-user in-flight limits.
    pub fn with_limits(mut self, max_in_flight: usize, per_user_limit: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self.per_user_limit = per_user_limit;
        self
    }

    /// Sets the retry parameters.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.max_in_flight, 32);
        assert_eq!(config.per_user_limit, 3);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.multiplier, 2.0);
    }

    #[test]
    fn test_deserialize_nested_retry() {
        let toml = r#"
            workers = 4
            [retry]
            max_attempts = 5
            initial_delay_ms = 250
        "#;
        let config: SchedulerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.per_user_limit, 3);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 250);
        assert_eq!(config.retry.max_delay_ms, 30_000);
    }
}
