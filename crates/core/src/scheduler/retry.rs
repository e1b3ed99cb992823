//! Exponential backoff for transient stage failures.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics;
use crate::transcoder::TranscodeError;
use crate::transport::TransportError;

use super::config::RetryConfig;

/// Errors that may be worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Delay requested by the remote side, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        TransportError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl Retryable for TranscodeError {
    fn is_retryable(&self) -> bool {
        TranscodeError::is_retryable(self)
    }
}

/// Attempt bound and delay schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the `retry`-th failure (1-based), capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(63) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Delay before the next attempt. A retry-after hint wins over the schedule.
    pub fn next_delay<E: Retryable>(&self, error: &E, retry: u32) -> Duration {
        error.retry_after().unwrap_or_else(|| self.delay_for(retry))
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Cancellation during a backoff sleep returns the last error at once.
    pub async fn run<T, E, F, Fut>(
        &self,
        stage: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.max_attempts || cancel.is_cancelled() {
                return Err(error);
            }

            let delay = self.next_delay(&error, attempt);
            debug!(
                stage = stage,
                attempt = attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient failure, retrying"
            );
            metrics::RETRIES.with_label_values(&[stage]).inc();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(error),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(350),
        }
    }

    #[test]
    fn test_delay_schedule() {
        let policy = policy(5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_retry_after_takes_precedence() {
        let policy = policy(5);
        let limited = TransportError::rate_limited(Some(Duration::from_secs(7)));
        assert_eq!(policy.next_delay(&limited, 1), Duration::from_secs(7));
        let timeout = TransportError::timeout("slow");
        assert_eq!(policy.next_delay(&timeout, 2), Duration::from_millis(200));
    }

    #[test]
    fn test_from_config_clamps() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            initial_delay_ms: 10,
            multiplier: 0.5,
            max_delay_ms: 100,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.multiplier, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_retried_with_growing_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();
        let result: Result<(), TransportError> = policy(3)
            .run("upload", &CancellationToken::new(), |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TransportError::connection("reset"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), TransportError> = policy(5)
            .run("upload", &CancellationToken::new(), |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TransportError::new(TransportErrorKind::Forbidden, "blocked"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, TransportErrorKind::Forbidden);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient() {
        let result: Result<u32, TransportError> = policy(3)
            .run("download", &CancellationToken::new(), |attempt| async move {
                if attempt < 2 {
                    Err(TransportError::timeout("slow"))
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: Result<(), TransportError> = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_delay: Duration::from_secs(600),
        }
        .run("upload", &cancel, |_| async { Err(TransportError::timeout("slow")) })
        .await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
