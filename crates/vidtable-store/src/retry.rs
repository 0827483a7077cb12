//! Bounded exponential backoff for transient storage failures.

use crate::error::{Result, StoreError};
use std::future::Future;
use std::time::Duration;

/// Retry policy applied to every store round trip.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries, for tests and local-only setups.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(1u32 << attempt.min(16));
        exp.min(self.max_backoff)
    }
}

/// Run `op` until it succeeds, fails terminally, or exhausts the policy.
///
/// Only [`StoreError::Transient`] failures are retried; exhaustion promotes
/// the last transient error to [`StoreError::Terminal`].
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(StoreError::Terminal(format!(
                        "{op_name}: retries exhausted after {attempt} attempts: {err}"
                    )));
                }
                let backoff = policy.backoff_for(attempt - 1);
                log::warn!(
                    "{op_name}: transient storage error (attempt {attempt}/{}), \
                     retrying in {backoff:?}: {err}",
                    policy.max_attempts
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_millis(50));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(20), policy.max_backoff);
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let calls = AtomicU32::new(0);
        let result: Result<u32> = rt.block_on(with_retry(&fast_policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Transient("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        }));
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhaustion_promotes_to_terminal() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let result: Result<()> = rt.block_on(with_retry(&fast_policy(), "test", || async {
            Err(StoreError::Transient("still down".into()))
        }));
        match result {
            Err(StoreError::Terminal(msg)) => assert!(msg.contains("retries exhausted")),
            other => panic!("expected Terminal, got {other:?}"),
        }
    }

    #[test]
    fn test_terminal_errors_fail_fast() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let calls = AtomicU32::new(0);
        let result: Result<()> = rt.block_on(with_retry(&fast_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Terminal("denied".into())) }
        }));
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
