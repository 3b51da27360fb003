//! Fixed-backoff retry for reconcile commands.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// How often, and how patiently, a failed reconcile command is retried.
///
/// Default: 2 attempts, 10s apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,

    /// Pause between two attempts.
    pub backoff: Duration,
}

impl ReconcilePolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before attempt number `attempt` (1-indexed). The first attempt
    /// runs immediately.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff
        }
    }
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(10))
    }
}

/// Error of the last attempt, plus how many attempts were made.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or `policy.max_attempts` is used up.
pub async fn retry_fixed<T, E, F, Fut>(
    policy: &ReconcilePolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
            Err(err) => {
                warn!(
                    op = label,
                    attempt,
                    max_attempts,
                    error = %err,
                    "attempt failed; retrying after backoff"
                );
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_policy_has_two_attempts_ten_seconds_apart() {
        let policy = ReconcilePolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        assert_eq!(ReconcilePolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_second_attempt_after_backoff() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<u32, RetryExhausted<String>> =
            retry_fixed(&ReconcilePolicy::default(), "close", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 { Err("boom".to_string()) } else { Ok(n) }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_with_last_error() {
        let calls = &AtomicU32::new(0);
        let policy = ReconcilePolicy::new(3, Duration::from_secs(1));

        let result: Result<(), _> = retry_fixed(&policy, "requeue", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("failure {n}"))
        })
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
