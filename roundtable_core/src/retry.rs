use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Exhausted(E),
}

/// Retry an async operation with a fixed backoff schedule.
///
/// The operation runs once, then once more after each entry of `delays`.
/// Both the attempts and the waits race against `cancel`; a cancelled token
/// abandons the in-flight attempt and returns [`RetryError::Cancelled`].
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    delays: &[Duration],
    cancel: &CancellationToken,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let total = delays.len() + 1;

    for attempt in 1..=total {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = operation() => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                let Some(delay) = delays.get(attempt - 1) else {
                    return Err(RetryError::Exhausted(e));
                };
                warn!(
                    "Request failed (attempt {attempt}/{total}): {e}. Retrying after {}ms...",
                    delay.as_millis()
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(RetryError::Cancelled),
                    () = sleep(*delay) => {}
                }
            }
        }
    }

    Err(RetryError::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FAST: [Duration; 2] = [Duration::from_millis(1), Duration::from_millis(1)];

    #[tokio::test]
    async fn retry_succeeds_on_first_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            },
            &FAST,
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_succeeds_after_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: Result<(), RetryError<String>> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 3 {
                        Err(String::from("fail"))
                    } else {
                        Ok(())
                    }
                }
            },
            &FAST,
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_fails_after_all_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: Result<(), RetryError<String>> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(String::from("fail"))
                }
            },
            &FAST,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(result, Err(RetryError::Exhausted(String::from("fail"))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn retry_stops_when_cancelled_during_backoff() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let result: Result<(), RetryError<String>> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                let cancel = cancel.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    cancel.cancel();
                    Err(String::from("fail"))
                }
            },
            &[Duration::from_secs(30)],
            &cancel,
        )
        .await;
        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
