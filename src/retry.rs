use serde::Deserialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 指数退避重试策略
///
/// With the defaults an operation is attempted 3 times and sleeps 1s then 2s
/// between attempts. No sleep follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            multiplier,
        }
    }

    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sleep that follows failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.initial_delay_ms);
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        base.mul_f64(factor)
    }
}

/// Runs `attempt` until it succeeds, `is_retryable` rejects the error, or the
/// policy's attempts are used up. Returns the last error in the latter cases.
///
/// Sleeps with `tokio::time::sleep`, so only the calling task waits.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: P,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut n = 1;
    loop {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) if n < max_attempts && is_retryable(&e) => {
                let delay = policy.delay_after(n);
                warn!(
                    operation,
                    attempt = n,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum Failure {
        Flaky,
        Broken,
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    #[test]
    fn test_delays_double() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_after(1), Duration::from_secs(1));
        assert_eq!(p.delay_after(2), Duration::from_secs(2));
        assert_eq!(p.delay_after(3), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let out = retry_with_backoff(
            &RetryPolicy::default(),
            "test",
            |e: &Failure| *e == Failure::Flaky,
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Failure::Flaky)
                } else {
                    Ok(42)
                }
            },
        )
        .await;
        assert_eq!(out, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let out: Result<(), Failure> = retry_with_backoff(
            &RetryPolicy::default(),
            "test",
            |_: &Failure| true,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::Flaky)
            },
        )
        .await;
        assert_eq!(out, Err(Failure::Flaky));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let out: Result<(), Failure> = retry_with_backoff(
            &RetryPolicy::default(),
            "test",
            |e: &Failure| *e == Failure::Flaky,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::Broken)
            },
        )
        .await;
        assert_eq!(out, Err(Failure::Broken));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(1));
    }
}
