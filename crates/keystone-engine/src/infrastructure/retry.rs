//! Backoff retry for optimistic-concurrency conflicts

use std::future::Future;

use tracing::warn;

use crate::config::RetryConfig;
use crate::core::{EngineError, EngineResult, StorageError};

fn is_version_conflict(err: &EngineError) -> bool {
    matches!(err, EngineError::Storage(StorageError::VersionConflict { .. }))
}

/// Run `operation` again after a version conflict, up to `max_retries` times.
///
/// Only use this for operations with no external side effect; every attempt
/// must re-read the state it modifies.
pub async fn retry_on_conflict<T, F, Fut>(config: &RetryConfig, label: &str, mut operation: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Err(err) if is_version_conflict(&err) && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                warn!(operation = label, attempt, ?delay, "Version conflict, retrying: {}", err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retries_conflicts_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_on_conflict(&fast_retry(), "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StorageError::version_conflict("account", 1, 2).into())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: EngineResult<()> = retry_on_conflict(&fast_retry(), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::version_conflict("account", 1, 2).into())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: EngineResult<()> = retry_on_conflict(&fast_retry(), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Configuration("bad".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
