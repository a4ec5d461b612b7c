//! Request-scoped timeouts and retry schedules for calls to external services.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Timeout and retry budget for one external call.
///
/// A call that times out is retried up to `retries` times. Only idempotent
/// operations should be given a non-zero retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Deadline for each attempt
    pub timeout: Duration,
    /// Extra attempts after a timeout
    pub retries: u32,
}

impl CallPolicy {
    /// Create a policy.
    #[must_use]
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }

    /// The same deadline with no retries.
    #[must_use]
    pub fn once(self) -> Self {
        Self {
            retries: 0,
            ..self
        }
    }

    /// Run `op` under the deadline, retrying on timeout.
    ///
    /// Errors returned by `op` itself are passed through untouched; only
    /// elapsed deadlines are retried. When the budget is exhausted the
    /// timeout is reported through `on_timeout`.
    pub async fn run<T, E, F, Fut>(
        &self,
        what: &str,
        mut op: F,
        on_timeout: impl Fn(String) -> E,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => return result,
                Err(_) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "{} timed out after {:?}, retrying ({}/{})",
                        what, self.timeout, attempt, self.retries
                    );
                }
                Err(_) => {
                    return Err(on_timeout(format!(
                        "{what} timed out after {:?}",
                        self.timeout
                    )));
                }
            }
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retries: 2,
        }
    }
}

/// Retry schedule for transient HTTP failures.
///
/// Rate limiting (429) and server errors (5xx) are retried with exponential
/// backoff: `base * 2^attempt`, with the exponent capped at 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base: Duration,
}

impl Backoff {
    /// Create a schedule.
    #[must_use]
    pub fn new(max_retries: u32, base: Duration) -> Self {
        Self { max_retries, base }
    }

    /// Whether an HTTP status is worth retrying.
    #[must_use]
    pub fn is_transient(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * (1u32 << attempt.min(5))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_passes_through_success() {
        let policy = CallPolicy::new(Duration::from_millis(100), 0);
        let result: Result<u32, String> = policy.run("op", || async { Ok(7) }, |m| m).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_passes_through_error_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = CallPolicy::new(Duration::from_millis(100), 3);

        let result: Result<u32, String> = policy
            .run(
                "op",
                || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err("boom".to_string())
                    }
                },
                |m| m,
            )
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_on_timeout_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = CallPolicy::new(Duration::from_millis(50), 2);

        let result: Result<u32, String> = policy
            .run(
                "embed",
                || {
                    let calls = Arc::clone(&calls);
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        if n == 0 {
                            tokio::time::sleep(Duration::from_secs(10)).await;
                        }
                        Ok(n)
                    }
                },
                |m| m,
            )
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_timeout_when_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = CallPolicy::new(Duration::from_millis(50), 1);

        let result: Result<(), String> = policy
            .run(
                "generate",
                || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(())
                    }
                },
                |m| m,
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.starts_with("generate timed out"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_schedule() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay(9), Duration::from_millis(16000));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(Backoff::is_transient(429));
        assert!(Backoff::is_transient(500));
        assert!(Backoff::is_transient(503));
        assert!(!Backoff::is_transient(400));
        assert!(!Backoff::is_transient(404));
        assert!(!Backoff::is_transient(409));
    }

    #[test]
    fn test_once_drops_retries() {
        let policy = CallPolicy::new(Duration::from_secs(5), 4).once();
        assert_eq!(policy.retries, 0);
        assert_eq!(policy.timeout, Duration::from_secs(5));
    }
}
