//! Bounded Retry Policy
//!
//! Provider calls are retried a small fixed number of times with exponential
//! backoff and a per-attempt timeout. The policy is an explicit object handed
//! to the orchestrator so the backoff behavior is swappable and testable on
//! its own.

use std::future::Future;
use std::time::Duration;

use super::provider::{ProviderError, ProviderResult};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            // A zero-attempt policy could never call the provider at all
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay applied after the given 1-based attempt, doubling each time
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    ///
    /// An attempt that outlives `timeout` counts like any other failure and
    /// surfaces as [`ProviderError::Timeout`] if it was the last one.
    pub async fn run<T, F, Fut>(&self, timeout: Duration, mut op: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut last_error = ProviderError::Timeout;

        for attempt in 1..=self.max_attempts {
            match tokio::time::timeout(timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    log::warn!(
                        "provider call attempt {attempt}/{} failed: {err}",
                        self.max_attempts
                    );
                    last_error = err;
                }
                Err(_) => {
                    log::warn!(
                        "provider call attempt {attempt}/{} timed out",
                        self.max_attempts
                    );
                    last_error = ProviderError::Timeout;
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.delay_for(attempt)).await;
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = fast_policy()
            .run(Duration::from_secs(1), move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderError::Api {
                            status: 503,
                            message: "overloaded".to_string(),
                        })
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: ProviderResult<u32> = fast_policy()
            .run(Duration::from_secs(1), move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::ContentPolicy("rejected".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::ContentPolicy(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let result: ProviderResult<u32> = fast_policy()
            .run(Duration::from_millis(5), || async {
                std::future::pending::<ProviderResult<u32>>().await
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Timeout)));
    }
}
