//! Retry with exponential backoff for service calls.

use relay_core::{RelayError, RetryPolicy};
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry policy applied to service RPCs. Tight initial interval because most
/// transient failures clear quickly, bounded overall so a dead connection
/// surfaces within a minute.
pub fn dynamic_service_retry_policy() -> RetryPolicy {
    RetryPolicy {
        initial_interval: Duration::from_millis(20),
        backoff_coefficient: 1.7,
        maximum_interval: Duration::from_secs(6),
        maximum_attempts: 0,
        expiration_interval: Duration::from_secs(60),
    }
}

/// Backoff for the given zero-based attempt, capped at the policy maximum.
pub fn backoff_interval(policy: &RetryPolicy, attempt: i32) -> Duration {
    let millis =
        policy.initial_interval.as_millis() as f64 * policy.backoff_coefficient.powi(attempt);
    Duration::from_millis(millis as u64).min(policy.maximum_interval)
}

/// Run `op` until it succeeds, the error is not retryable, or the policy's
/// attempt/expiration budget runs out. The last error is returned.
pub async fn retry<T, Op, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&RelayError) -> bool,
    mut op: Op,
) -> Result<T, RelayError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    let started = Instant::now();
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                if policy.maximum_attempts > 0 && attempt + 1 >= policy.maximum_attempts {
                    return Err(err);
                }
                let backoff = backoff_interval(policy, attempt);
                if !policy.expiration_interval.is_zero()
                    && started.elapsed() + backoff >= policy.expiration_interval
                {
                    return Err(err);
                }
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{is_service_transient_error, ServerError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(maximum_attempts: i32) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_millis(10),
            maximum_attempts,
            expiration_interval: Duration::from_secs(0),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(20),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_millis(100),
            maximum_attempts: 0,
            expiration_interval: Duration::from_secs(0),
        };
        assert_eq!(backoff_interval(&policy, 0), Duration::from_millis(20));
        assert_eq!(backoff_interval(&policy, 1), Duration::from_millis(40));
        assert_eq!(backoff_interval(&policy, 2), Duration::from_millis(80));
        assert_eq!(backoff_interval(&policy, 3), Duration::from_millis(100));
        assert_eq!(backoff_interval(&policy, 10), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let attempts = AtomicU32::new(0);
        let result = retry(&quick_policy(0), is_service_transient_error, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RelayError::Server(ServerError::ServiceBusy {
                        message: "busy".into(),
                    }))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry(&quick_policy(0), is_service_transient_error, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RelayError::Server(ServerError::EntityNotExists {
                    message: "gone".into(),
                }))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn respects_maximum_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry(&quick_policy(3), is_service_transient_error, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(RelayError::Transport("unreachable".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
