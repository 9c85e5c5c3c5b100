//! Fixed-delay retry for destination writes.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempts made before giving up.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Pause between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// How often and how patiently an operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,

    /// Sleep between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once.
    #[must_use]
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Runs `operation` until it succeeds or the attempts are exhausted.
    ///
    /// `operation` receives the one based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(
                        attempt,
                        attempts,
                        delay_secs = self.delay.as_secs(),
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn gives_up_after_all_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), String> = instant(3)
            .run(|attempt| {
                calls.set(calls.get() + 1);
                async move { Err(format!("attempt {attempt}")) }
            })
            .await;

        assert_eq!(result, Err("attempt 3".to_string()));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = Cell::new(0);
        let result: Result<u32, String> = instant(3)
            .run(|attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt == 2 {
                        Ok(attempt)
                    } else {
                        Err("no".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = Cell::new(0);
        let _: Result<(), String> = instant(0)
            .run(|_| {
                calls.set(calls.get() + 1);
                async { Err("no".to_string()) }
            })
            .await;

        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_between_attempts() {
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();

        let _: Result<(), String> = policy.run(|_| async { Err("no".to_string()) }).await;

        assert_eq!(started.elapsed(), DEFAULT_DELAY * 2);
    }
}
