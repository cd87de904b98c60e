//! Retry policy for calls to external services.
//!
//! Attempts are classified by the caller: a retryable error is tried again
//! after the policy's delay, anything else stops immediately. The outcome
//! keeps the two failure kinds apart so the caller never has to inspect
//! error identity after the fact.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PipelineError;

/// Retry behaviour for one operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each retry. `1` keeps it fixed.
    pub backoff_factor: u32,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 1,
            max_delay: Duration::from_secs(30),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryPolicy {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Exponential backoff instead of a fixed delay.
    pub fn with_backoff_factor(mut self, factor: u32) -> Self {
        self.backoff_factor = factor.max(1);
        self
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_factor.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Every attempt failed with a retryable error.
    RetryableFailure { error: E, attempts: u32 },
    /// An attempt failed with an error that is not worth retrying.
    Fatal { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success(_))
    }

    /// Number of attempts made, if the operation failed.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryOutcome::Success(_) => None,
            RetryOutcome::RetryableFailure { attempts, .. } | RetryOutcome::Fatal { attempts, .. } => {
                Some(*attempts)
            }
        }
    }
}

impl<T> RetryOutcome<T, PipelineError> {
    /// Collapse into a result; exhausted retries are wrapped with the attempt count.
    pub fn into_result(self, operation: &str) -> Result<T, PipelineError> {
        match self {
            RetryOutcome::Success(value) => Ok(value),
            RetryOutcome::RetryableFailure { error, attempts } => Err(PipelineError::RetriesExhausted {
                operation: operation.to_string(),
                attempts,
                source: Box::new(error),
            }),
            RetryOutcome::Fatal { error, .. } => Err(error),
        }
    }
}

/// Run `operation` until it succeeds, fails fatally, or attempts run out.
///
/// `is_retryable` decides whether a failure should be retried.
pub async fn retry_async<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    is_retryable: R,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match operation(attempt).await {
            Ok(value) => return RetryOutcome::Success(value),
            Err(e) if !is_retryable(&e) => {
                return RetryOutcome::Fatal {
                    error: e,
                    attempts: attempt,
                }
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = %policy.operation_name,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                metrics::counter!("talkreel_retries_total", "operation" => policy.operation_name.clone())
                    .increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(
                    operation = %policy.operation_name,
                    attempts = attempt,
                    "Retries exhausted"
                );
                return RetryOutcome::RetryableFailure {
                    error: e,
                    attempts: attempt,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new("test")
            .with_max_attempts(attempts)
            .with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_delay_schedule() {
        let fixed = RetryPolicy::default();
        assert_eq!(fixed.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(fixed.delay_for_attempt(3), Duration::from_secs(1));

        let exp = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_backoff_factor(2);
        assert_eq!(exp.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(exp.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(exp.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(exp.delay_for_attempt(20), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let outcome = retry_async(&fast(3), |_: &String| true, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("attempt {} failed", attempt))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert!(matches!(outcome, RetryOutcome::Success(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<(), String> = retry_async(&fast(3), |_| true, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;

        assert!(matches!(outcome, RetryOutcome::RetryableFailure { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<(), String> = retry_async(&fast(5), |_| false, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("bad request".to_string()) }
        })
        .await;

        assert!(matches!(outcome, RetryOutcome::Fatal { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_into_result_wraps_exhaustion() {
        let outcome: RetryOutcome<(), PipelineError> = retry_async(
            &fast(2),
            PipelineError::is_retryable,
            |_| async { Err(PipelineError::synthesis_transient("503")) },
        )
        .await;

        let err = outcome.into_result("synthesis").unwrap_err();
        assert!(matches!(err, PipelineError::RetriesExhausted { attempts: 2, .. }));
    }
}
