use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tracing::{debug, warn};

use crate::error::AgroError;

/// Bounded exponential backoff for transport failures on weather calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub const fn none() -> Self {
        Self { max_retries: 0, initial_backoff_ms: 0 }
    }

    /// Delay before retry number `retry` (0-based): initial * 2^retry.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }

    /// Run `op`, retrying only while it fails with a transient error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, AgroError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgroError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retry < self.max_retries => {
                    let delay = self.backoff(retry);
                    warn!(
                        attempt = retry + 1,
                        max_attempts = self.max_retries + 1,
                        error = %err,
                        "{what} failed, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => {
                    debug!(error = %err, "{what} failed after {} attempt(s)", retry + 1);
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
    fn backoff_doubles() {
        let policy = RetryPolicy { max_retries: 3, initial_backoff_ms: 100 };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn retries_transport_errors_up_to_bound() {
        let policy = RetryPolicy { max_retries: 2, initial_backoff_ms: 1 };
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = policy
            .run("test call", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AgroError::Transport("connection reset".into()))
            })
            .await;

        assert!(matches!(result, Err(AgroError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let policy = RetryPolicy { max_retries: 2, initial_backoff_ms: 1 };
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = policy
            .run("test call", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AgroError::Transport("timeout".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let policy = RetryPolicy { max_retries: 5, initial_backoff_ms: 1 };
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = policy
            .run("test call", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AgroError::NotFound("Atlantis".into()))
            })
            .await;

        assert!(matches!(result, Err(AgroError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn none_policy_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let _ = RetryPolicy::none()
            .run("test call", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AgroError::Transport("down".into()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
