use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::types::Result;

/// Exponential backoff for transient leaf failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(2000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Base delay before retry number `attempt` (0-based), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let millis = (self.initial_backoff.as_millis() as f64 * factor)
            .min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// Base delay plus up to 50% random jitter, still capped.
    pub fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        let spread = (base.as_millis() as u64) / 2;
        let jitter = if spread == 0 {
            0
        } else {
            rand::rng().random_range(0..=spread)
        };
        (base + Duration::from_millis(jitter)).min(self.max_backoff)
    }
}

/// Run `op` until it succeeds, fails permanently or the retries run out.
///
/// Only errors with [`is_transient`](crate::types::AppError::is_transient)
/// are retried. Returns the final outcome and the number of attempts made.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> (Result<T>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return (Ok(value), attempt + 1),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.backoff_with_jitter(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return (Err(e), attempt + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(10), Duration::from_millis(2000));
        for attempt in 0..6 {
            let d = policy.backoff_with_jitter(attempt);
            assert!(d >= policy.backoff(attempt) && d <= policy.max_backoff);
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_exhausted() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = retry(&fast(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AppError::SourceUnavailable("503".into())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::SourceUnavailable(_))));
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let (result, attempts) = retry(&fast(), |_| async {
            Err::<(), _>(AppError::MalformedTask("bad fragment".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let (result, attempts) = retry(&fast(), |attempt| async move {
            if attempt == 0 {
                Err(AppError::SourceUnavailable("blip".into()))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts, 2);
    }
}
