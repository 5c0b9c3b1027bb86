use crate::config::FetchSettings;
use crate::feed::fetcher::FetchError;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with a fixed delay between attempts.
///
/// Which errors are worth another attempt is decided by
/// [`FetchError::is_retryable`]; anything else ends the loop at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Sleep between a failed attempt and the next one.
    pub delay: Duration,
    /// Upper bound on a single request, body included.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&FetchSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            delay: settings.retry_delay(),
            request_timeout: settings.request_timeout(),
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. The last error is returned.
    pub async fn run<T, F, Fut>(&self, source: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    tracing::debug!(source = %source, attempt = attempt, "Request succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        source = %source,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying after delay"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        source = %source,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                        "All attempts failed"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source,
                        attempt = attempt,
                        error = %e,
                        "Unexpected error, not retrying"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_retryable_error_uses_full_budget() {
        let calls = Cell::new(0);
        let result: Result<(), _> = policy(3)
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(FetchError::Timeout) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Timeout)));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = policy(3)
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(FetchError::Parse("bad xml".into())) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Parse(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_success_after_transient_failure() {
        let calls = Cell::new(0);
        let result = policy(3)
            .run("test", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 2 {
                        Err(FetchError::HttpStatus(503))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = Cell::new(0);
        let _: Result<(), _> = policy(0)
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(FetchError::Timeout) }
            })
            .await;
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(1),
        };
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = policy.run("test", || async { Err(FetchError::Timeout) }).await;

        // Two delays: after attempt 1 and after attempt 2, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }
}
