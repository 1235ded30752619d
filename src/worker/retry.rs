//! Retry with exponential backoff and jitter, for the retryable error
//! classes (`timeout`, `rate_limit`, `transient`).

use std::time::Duration;
use tokio::time::sleep;

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryConfig {
    /// Exponential delay for the given (1-indexed) attempt, before jitter.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        let millis = (self.base_delay.as_millis() as u64)
            .saturating_mul(exp)
            .min(self.max_delay.as_millis() as u64);
        Duration::from_millis(millis)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_for_attempt(attempt);
        let jitter_millis = self.jitter.as_millis() as i64;
        if jitter_millis == 0 {
            return base;
        }
        let offset = fastrand::i64(-jitter_millis..=jitter_millis);
        let total = (base.as_millis() as i64 + offset).max(0) as u64;
        Duration::from_millis(total)
    }
}

/// Runs `f` up to `config.max_attempts` times, sleeping with jittered
/// exponential backoff between attempts, stopping early on a
/// non-retryable error.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut f: F) -> Result<T, WorkflowError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, WorkflowError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_attempts && err.is_retryable() => {
                sleep(config.jittered_delay(attempt)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_until_success_within_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            jitter: Duration::from_millis(0),
            ..RetryConfig::default()
        };
        let attempts_clone = attempts.clone();
        let result = retry_with_backoff(&config, move |_| {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(WorkflowError::WorkerTransient {
                        worker: "w".into(),
                        reason: "rate_limit".into(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_exactly_max_attempts_when_always_retryable() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            jitter: Duration::from_millis(0),
            ..RetryConfig::default()
        };
        let attempts_clone = attempts.clone();
        let result: Result<(), WorkflowError> = retry_with_backoff(&config, move |_| {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(WorkflowError::WorkerTransient {
                    worker: "w".into(),
                    reason: "rate_limit".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<(), WorkflowError> =
            retry_with_backoff(&RetryConfig::default(), move |_| {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(WorkflowError::Validation("bad input".into()))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
