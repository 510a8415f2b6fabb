//! Retry logic with exponential backoff
//!
//! Delay for attempt `n` (zero-based) is
//! `min(base_delay * backoff_factor^n * (1 ± jitter), max_delay)`.
//! Permanent errors are returned immediately without sleeping.

use crate::{ErrorKind, LLMError, Result};
use research_utils::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Growth factor per attempt
    pub backoff_factor: f64,

    /// Relative jitter in `[0, 1)`; `0.1` spreads each delay by ±10%
    pub jitter: f64,

    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            jitter: 0.1,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            backoff_factor: settings.backoff_factor,
            jitter: settings.jitter,
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        backoff_factor: f64,
        jitter: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_factor,
            jitter: jitter.clamp(0.0, 0.99),
            max_delay,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
            jitter: 0.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Create a policy with fast, deterministic retries (for testing)
    pub fn fast() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
            jitter: 0.0,
            max_delay: Duration::from_millis(100),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 0.99);
        self
    }

    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let mut secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if self.jitter > 0.0 {
            secs *= 1.0 + self.jitter * (2.0 * fastrand::f64() - 1.0);
        }

        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Execute an async operation with retry logic
    ///
    /// `operation` receives the zero-based attempt number. Success and
    /// permanent errors return at once; transient errors are retried until
    /// `max_retries + 1` attempts have been made, after which
    /// [`LLMError::ExhaustedRetries`] wraps the last error.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt + 1,
                self.max_attempts(),
                operation_name
            );

            let error = match operation(attempt).await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(e) => e,
            };

            if error.kind() == ErrorKind::Permanent {
                debug!(
                    "Operation '{}' failed with non-retryable error: {}",
                    operation_name, error
                );
                return Err(error);
            }

            if attempt >= self.max_retries {
                warn!(
                    "Operation '{}' failed after {} attempts: {}",
                    operation_name,
                    attempt + 1,
                    error
                );
                return Err(LLMError::ExhaustedRetries {
                    attempts: attempt + 1,
                    last: Box::new(error),
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                operation_name,
                attempt + 1,
                self.max_attempts(),
                error,
                delay
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    fn transient() -> LLMError {
        LLMError::upstream("503 Service Unavailable")
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.backoff_factor, 2.0);
        assert_eq!(policy.max_attempts(), 6);
    }

    #[test]
    fn test_from_settings() {
        let policy = RetryPolicy::from(&RetrySettings::default());
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_delays_monotonic_and_capped_without_jitter() {
        let policy = RetryPolicy::new(
            20,
            Duration::from_millis(500),
            2.0,
            0.0,
            Duration::from_secs(30),
        );

        let delays: Vec<_> = (0..20).map(|a| policy.delay_for(a)).collect();
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[2], Duration::from_secs(2));
        for pair in delays.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(30)));
        assert_eq!(delays[19], Duration::from_secs(30));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::default().with_jitter(0.0);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::default().with_jitter(0.25);
        for _ in 0..200 {
            let d = policy.delay_for(1).as_secs_f64();
            assert!((3.0..=5.0).contains(&d), "delay {d} outside ±25% of 4s");
        }
    }

    #[tokio::test]
    async fn test_execute_success_first_try() {
        let policy = RetryPolicy::fast();
        let attempt_count = Arc::new(Mutex::new(0));
        let count = attempt_count.clone();

        let result = policy
            .execute("test_op", |_| {
                let count = count.clone();
                async move {
                    *count.lock().await += 1;
                    Ok::<i32, LLMError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempt_count.lock().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_success_after_retry() {
        let policy = RetryPolicy::fast();

        let result = policy
            .execute("test_op", |attempt| async move {
                if attempt < 2 {
                    Err(transient())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_exhaust_attempts() {
        let policy = RetryPolicy::fast();
        let attempt_count = Arc::new(Mutex::new(0u32));
        let count = attempt_count.clone();
        let start = Instant::now();

        let result: Result<()> = policy
            .execute("test_op", |_| {
                let count = count.clone();
                async move {
                    *count.lock().await += 1;
                    Err(transient())
                }
            })
            .await;

        assert_eq!(*attempt_count.lock().await, policy.max_retries + 1);
        match result {
            Err(LLMError::ExhaustedRetries { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert!(last.is_transient());
            }
            other => panic!("expected ExhaustedRetries, got {other:?}"),
        }

        // 10 + 20 + 40 ms of backoff, no sleep after the last attempt
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(70), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(80), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_fails_without_sleeping() {
        let policy = RetryPolicy::default();
        let attempt_count = Arc::new(Mutex::new(0u32));
        let count = attempt_count.clone();
        let start = Instant::now();

        let result: Result<()> = policy
            .execute("test_op", |_| {
                let count = count.clone();
                async move {
                    *count.lock().await += 1;
                    Err(LLMError::upstream("403 Forbidden: API key revoked"))
                }
            })
            .await;

        assert_eq!(*attempt_count.lock().await, 1);
        assert!(matches!(
            result,
            Err(LLMError::Upstream {
                kind: ErrorKind::Permanent,
                ..
            })
        ));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let policy = RetryPolicy::no_retry();
        let result: Result<()> = policy.execute("test_op", |_| async { Err(transient()) }).await;
        assert!(matches!(result, Err(LLMError::ExhaustedRetries { attempts: 1, .. })));
    }
}
