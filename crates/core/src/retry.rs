//! Fixed-delay bounded retry.
//!
//! Used for both database connection establishment and the process-level
//! startup sequence. Unlike an exponential backoff, the delay between
//! attempts is constant and the number of attempts is capped.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Values below 1
    /// are treated as 1.
    pub max_attempts: u32,
    /// Fixed delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number. Each failure except the
    /// last is logged at warn level and followed by [`RetryPolicy::delay`].
    /// The error from the final attempt is returned.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Giving up after {attempt} attempts",
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Attempt {attempt}/{max_attempts} failed, retrying",
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::time::Instant;

    use super::*;

    /// Run a policy against an operation that always fails, recording the
    /// instant of each attempt relative to the start.
    async fn failing_attempts(policy: RetryPolicy) -> Vec<Duration> {
        let start = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let result: Result<(), String> = policy
            .run("test", |_| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push(start.elapsed());
                    Err("boom".to_string())
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        let attempts = seen.lock().unwrap().clone();
        attempts
    }

    #[tokio::test(start_paused = true)]
    async fn makes_exactly_max_attempts_with_fixed_spacing() {
        let attempts = failing_attempts(RetryPolicy::fixed(5, Duration::from_secs(2))).await;

        assert_eq!(attempts.len(), 5);
        for (i, at) in attempts.iter().enumerate() {
            assert_eq!(at.as_secs(), 2 * i as u64);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let calls = Arc::new(Mutex::new(0u32));
        let policy = RetryPolicy::fixed(5, Duration::from_secs(2));

        let result: Result<u32, String> = policy
            .run("test", |attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    *calls.lock().unwrap() += 1;
                    if attempt < 3 {
                        Err("not yet".into())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let attempts = failing_attempts(RetryPolicy::fixed(0, Duration::from_secs(1))).await;
        assert_eq!(attempts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_delay_after_final_failure() {
        let start = Instant::now();
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));

        let _: Result<(), &str> = policy.run("test", |_| async { Err("down") }).await;

        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
