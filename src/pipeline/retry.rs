//! Bounded retry with exponential backoff for transcription calls.

use crate::defaults;
use crate::error::{ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            defaults::RETRY_ATTEMPTS,
            Duration::from_millis(defaults::RETRY_INITIAL_DELAY_MS),
            defaults::RETRY_BACKOFF_FACTOR,
        )
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one; factors below 1.0 become 1.0.
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        let backoff_factor = if backoff_factor.is_finite() && backoff_factor >= 1.0 {
            backoff_factor
        } else {
            1.0
        };
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_factor,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based), capped at
    /// [`defaults::RETRY_MAX_DELAY_MS`].
    pub fn delay_for(&self, retry: u32) -> Duration {
        let cap = Duration::from_millis(defaults::RETRY_MAX_DELAY_MS);
        let exponent = retry.saturating_sub(1).min(16) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(cap, |delay| delay.min(cap))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. Only transcription-kind errors are retried.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.kind() == ErrorKind::Transcription && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_new_clamps_values() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10), 0.5);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for(3), Duration::from_millis(10));
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100), 2.0);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_huge_backoff_is_capped() {
        let cap = Duration::from_millis(defaults::RETRY_MAX_DELAY_MS);
        let policy = RetryPolicy::new(3, Duration::from_millis(1000), 1e30);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), cap);
        assert_eq!(policy.delay_for(3), cap);
    }

    #[test]
    fn test_huge_initial_delay_is_capped() {
        let policy = RetryPolicy::new(2, Duration::from_secs(u64::MAX), 2.0);
        assert_eq!(
            policy.delay_for(2),
            Duration::from_millis(defaults::RETRY_MAX_DELAY_MS)
        );
    }

    #[test]
    fn test_default_is_single_attempt() {
        assert_eq!(RetryPolicy::default().max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_retries_transcription_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(5), 2.0);
        let result = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(VoxError::transcription("flaky"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(10), 1.0);
        let result: Result<()> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VoxError::transcription("always")) }
            })
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Transcription);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_kinds_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(10), 1.0);
        let result: Result<()> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VoxError::security("/etc/passwd", "outside allow-list")) }
            })
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Security);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
