//! Generic retry wrapper with exponential backoff and per-attempt
//! timeout, modeled on a tenacity-style retry decorator.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{FluxError, RetriesExhaustedError, TimeoutError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
    pub timeout: Duration,
    pub operation_name: String,
}

impl RetryPolicy {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
            operation_name: operation_name.into(),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `delay × 2^(attempt-1)`, capped at `delay × 8`, where `attempt`
    /// is 1-based (the attempt that just failed).
    fn backoff_for(&self, attempt: u32) -> Duration {
        let multiplier = 1u32 << attempt.saturating_sub(1).min(3);
        let scaled = self.delay * multiplier;
        scaled.min(self.delay * 8)
    }
}

/// Retries `op` according to `policy`. `should_retry` overrides the
/// default kind-based eligibility check when `Some`; `before_retry` runs
/// once per retry, before the next attempt, and is used for
/// resource-aware cleanup (e.g. `reset_retry_sensitive_state`).
pub async fn retry_with<F, Fut, T>(
    policy: &RetryPolicy,
    mut op: F,
    should_retry: Option<&dyn Fn(&FluxError) -> bool>,
    mut before_retry: Option<&mut dyn FnMut()>,
) -> Result<T, FluxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FluxError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let attempted = tokio::time::timeout(policy.timeout, op()).await;

        let result = match attempted {
            Ok(inner) => inner,
            Err(_) => Err(FluxError::Timeout(TimeoutError {
                operation: policy.operation_name.clone(),
                timeout_seconds: policy.timeout.as_secs(),
            })),
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let eligible = should_retry.map(|f| f(&err)).unwrap_or_else(|| err.is_retryable());
        if !eligible {
            return Err(err);
        }
        if attempt >= policy.retries {
            return Err(FluxError::RetriesExhausted(RetriesExhaustedError { attempts: attempt, source: Box::new(err) }));
        }

        let sleep_for = policy.backoff_for(attempt);
        warn!(operation = %policy.operation_name, attempt, backoff_ms = sleep_for.as_millis() as u64, "retrying after error: {err}");
        if let Some(hook) = before_retry.as_mut() {
            hook();
        }
        tokio::time::sleep(sleep_for).await;
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(retries={}, delay={:?})", self.operation_name, self.retries, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new("test_op").with_retries(3).with_delay(Duration::from_millis(10));

        let result: Result<u32, FluxError> = retry_with(
            &policy,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(FluxError::Source(SourceError::Io("transient".into())))
                    } else {
                        Ok(42)
                    }
                }
            },
            None,
            None,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_and_wraps_last_cause() {
        let policy = RetryPolicy::new("test_op").with_retries(2).with_delay(Duration::from_millis(5));
        let result: Result<u32, FluxError> = retry_with(
            &policy,
            || async { Err(FluxError::Source(SourceError::Io("always fails".into()))) },
            None,
            None,
        )
        .await;

        match result.unwrap_err() {
            FluxError::RetriesExhausted(e) => assert_eq!(e.attempts, 2),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn config_errors_are_never_retried() {
        use crate::errors::ConfigError;
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new("test_op").with_retries(5);
        let result: Result<u32, FluxError> = retry_with(
            &policy,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FluxError::Config(ConfigError::Invalid("bad".into()))) }
            },
            None,
            None,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
