//! Bounded retries with exponential backoff.

use crate::config::RetryConfig;
use crate::error::SyncResult;
use std::future::Future;
use tracing::warn;

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// or `config.max_attempts` attempts have been made.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, name: &str, mut operation: F) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(config.delay_for_attempt(attempt)).await;
        }
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                warn!(operation = name, attempt, error = %err, "retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&fast(3), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SyncError::transport_retryable("flaky"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: SyncResult<()> = with_retry(&fast(3), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Timeout)
        })
        .await;
        assert!(matches!(result, Err(SyncError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn conflict_and_auth_are_not_retried() {
        for err in [SyncError::Conflict("v1".into()), SyncError::Auth("expired".into())] {
            let calls = AtomicU32::new(0);
            let result: SyncResult<()> = with_retry(&fast(5), "test", || {
                let err = err.clone();
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(err) }
            })
            .await;
            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }
}
