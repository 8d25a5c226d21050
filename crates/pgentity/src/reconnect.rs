//! Exponential backoff for acquiring connections.

use crate::error::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;

/// Doubling wait between connection attempts, from `min_wait` up to `max_wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    min_wait: Duration,
    max_wait: Duration,
    max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(16), Duration::from_millis(5000), 10)
    }
}

impl Backoff {
    pub fn new(min_wait: Duration, max_wait: Duration, max_attempts: u32) -> Self {
        Self {
            min_wait,
            max_wait: max_wait.max(min_wait),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_wait.saturating_mul(factor).min(self.max_wait)
    }

    /// Run `op` until it succeeds, retrying connection errors only.
    ///
    /// Any other error is returned at once. After `max_attempts` failed tries
    /// a `Connection` error naming the last failure is returned.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(target: "pgentity.store", attempt, "reconnected");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_connection_error() && attempt < self.max_attempts => {
                    let wait = self.delay(attempt);
                    tracing::warn!(
                        target: "pgentity.store",
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "connection failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_connection_error() {
                        tracing::error!(
                            target: "pgentity.store",
                            attempts = attempt,
                            error = %err,
                            "giving up on connection"
                        );
                        return Err(StoreError::Connection(format!(
                            "no connection after {attempt} attempt(s): {err}"
                        )));
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_up_to_max() {
        let b = Backoff::default();
        assert_eq!(b.delay(1), Duration::from_millis(16));
        assert_eq!(b.delay(2), Duration::from_millis(32));
        assert_eq!(b.delay(5), Duration::from_millis(256));
        assert_eq!(b.delay(9), Duration::from_millis(4096));
        assert_eq!(b.delay(10), Duration::from_millis(5000));
        assert_eq!(b.delay(64), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_connection_errors_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let b = Backoff::new(Duration::from_millis(1), Duration::from_millis(4), 5);
        let out = b
            .retry(|| async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::Connection("refused".into()))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let b = Backoff::new(Duration::from_millis(1), Duration::from_millis(2), 3);
        let err = b
            .retry(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(StoreError::Connection("refused".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = Backoff::default()
            .retry(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(StoreError::invalid_query("bad"))
            })
            .await
            .unwrap_err();
        assert!(err.is_compile_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
