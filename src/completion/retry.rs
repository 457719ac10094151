use crate::error::CompletionError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff: `base_backoff * 2^(retry - 1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(retry - 1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(1000),
        }
    }
}

/// Injected sleep so retry loops can run without real delays in tests
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retries are spent. `op` receives the 0-based attempt number.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<T, CompletionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CompletionError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let mut delay = policy.backoff(attempt);
                if let CompletionError::RateLimited {
                    retry_after: Some(after),
                } = &e
                {
                    delay = delay.max(*after);
                }
                tracing::warn!(
                    "Completion attempt {} failed ({}), retry {}/{} after {:?}",
                    attempt,
                    e,
                    attempt,
                    policy.max_retries,
                    delay
                );
                sleeper.sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_backoff: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = policy(3);
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_retries_transient_failures_then_succeeds() {
        let sleeper = RecordingSleeper::default();

        let result = with_retry(&policy(3), &sleeper, |attempt| async move {
            if attempt < 2 {
                Err(CompletionError::Transient("503".to_string()))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_millis(500), Duration::from_millis(1000)]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let result: Result<(), _> = with_retry(&policy(2), &sleeper, |_| {
            calls += 1;
            async { Err(CompletionError::RateLimited { retry_after: None }) }
        })
        .await;

        assert!(matches!(result, Err(CompletionError::RateLimited { .. })));
        assert_eq!(calls, 3);
        assert_eq!(sleeper.slept.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;

        let result: Result<(), _> = with_retry(&policy(5), &sleeper, |_| {
            calls += 1;
            async { Err(CompletionError::NoCredential) }
        })
        .await;

        assert!(matches!(result, Err(CompletionError::NoCredential)));
        assert_eq!(calls, 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_extends_backoff() {
        let sleeper = RecordingSleeper::default();

        let _ = with_retry(&policy(1), &sleeper, |attempt| async move {
            if attempt == 0 {
                Err(CompletionError::RateLimited {
                    retry_after: Some(Duration::from_secs(7)),
                })
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(*sleeper.slept.lock().unwrap(), vec![Duration::from_secs(7)]);
    }
}
