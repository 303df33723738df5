//! Timeout and retry budget applied to every store access.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::store::StoreError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StorePolicy {
    /// Upper bound on a single store call.
    pub timeout: Duration,
    /// Total tries for a retriable operation, including the first.
    pub attempts: u32,
    /// Base delay between tries; grows linearly with the attempt number.
    pub backoff: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5_000),
            attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl StorePolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Run one store call, turning an elapsed timeout into `StoreError::Timeout`.
    pub async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(format!(
                "{operation} did not finish within {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Bounded call retried on transient failures. Only for idempotent operations.
    pub async fn read<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match self.bounded(operation, call()).await {
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!(operation, attempt, error = %e, "transient store failure, retrying");
                    tokio::time::sleep(self.backoff_for(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> StorePolicy {
        StorePolicy {
            timeout: Duration::from_millis(50),
            attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let err = fast()
            .bounded("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_the_budget_runs_out() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let err = fast()
            .read("flaky", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(StoreError::Unavailable("down".into()))
            })
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let _ = fast()
            .read("broken", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(StoreError::Backend("bad row".into()))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_retry_can_succeed() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let value = fast()
            .read("flaky", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StoreError::Timeout("slow".into()))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
