use std::future::Future;
use std::time::Duration;

use crate::providers::OrderError;

/// Exponential backoff for provider-bound calls, capped at 30 seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let millis = 500_u64.saturating_mul(2_u64.saturating_pow(attempt.min(8)));
    Duration::from_millis(millis.min(30_000))
}

/// Run `op` up to `max_attempts` times, sleeping between attempts.
/// Only transient failures are retried; a definitive provider rejection
/// is returned immediately.
pub async fn with_retries<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, OrderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OrderError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(OrderError::Rejected(msg)) => return Err(OrderError::Rejected(msg)),
            Err(OrderError::Transient(msg)) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(OrderError::Transient(msg));
                }
                tracing::warn!(attempt, "transient provider failure, retrying: {msg}");
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(20), Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fourth_attempt_within_bound() {
        let calls = AtomicU32::new(0);
        let result = with_retries(5, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(OrderError::Transient("timeout".to_string()))
                } else {
                    Ok("order")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "order");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(OrderError::Transient("down".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(OrderError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(OrderError::Rejected("bad creds".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(OrderError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
