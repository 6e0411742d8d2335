//! Retry policy for rate-limited remote calls.
//!
//! Exponential backoff with an unbounded attempt count by default and a hard
//! cap on total elapsed time. Each computed delay is clipped to what is left
//! of the budget; once the budget is spent the last error is returned.

use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::info;

use crate::{Error, Result};

/// Default total time budget across all attempts.
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(10);

/// Floor applied by [`RetryPolicy::with_initial_delay`].
pub const MIN_INITIAL_DELAY: Duration = Duration::from_millis(1);

/// Decides which errors are worth retrying.
pub type RetryPredicate = fn(&Error) -> bool;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Per-delay ceiling, applied before the budget clip.
    pub max_delay: Option<Duration>,
    /// Attempt cap; `None` means limited by `max_elapsed` only.
    pub max_attempts: Option<u32>,
    pub max_elapsed: Duration,
    pub retry_on: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: None,
            max_attempts: None,
            max_elapsed: DEFAULT_MAX_ELAPSED,
            retry_on: Error::is_rate_limited,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay.max(MIN_INITIAL_DELAY);
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn with_max_elapsed(mut self, budget: Duration) -> Self {
        self.max_elapsed = budget;
        self
    }

    pub fn with_predicate(mut self, retry_on: RetryPredicate) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Un-clipped delay after `tries` failed attempts (1-based).
    pub fn backoff(&self, tries: u32) -> Duration {
        let exp = tries.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        let mut delay = if secs.is_finite() && secs < u64::MAX as f64 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::MAX
        };
        if let Some(cap) = self.max_delay {
            delay = delay.min(cap);
        }
        delay
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// budget runs out.
    ///
    /// `target` names the operation and `params` are its call parameters; both
    /// only feed the per-retry log line.
    pub async fn run<T, F, Fut>(&self, target: &str, params: &Value, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let mut tries: u32 = 0;
        loop {
            tries += 1;
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if !(self.retry_on)(&err) {
                return Err(err);
            }
            if self.max_attempts.map(|m| tries >= m).unwrap_or(false) {
                info!(tries, operation = target, "giving up: attempt limit reached");
                return Err(err);
            }
            let elapsed = start.elapsed();
            if elapsed >= self.max_elapsed {
                info!(
                    tries,
                    operation = target,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "giving up: retry budget exhausted"
                );
                return Err(err);
            }

            let wait = self.backoff(tries).min(self.max_elapsed - elapsed);
            info!(
                wait_secs = wait.as_secs_f64(),
                tries,
                operation = target,
                kwargs = %params,
                "Backing off {:.1} seconds after {} tries calling function {}",
                wait.as_secs_f64(),
                tries,
                target
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(budget_ms: u64) -> RetryPolicy {
        RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(5))
            .with_max_elapsed(Duration::from_millis(budget_ms))
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let p = RetryPolicy::new().with_initial_delay(Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(4), Duration::from_millis(800));

        let capped = p.with_max_delay(Duration::from_millis(300));
        assert_eq!(capped.backoff(4), Duration::from_millis(300));
        assert_eq!(capped.backoff(200), Duration::from_millis(300));
    }

    #[test]
    fn test_zero_initial_delay_is_clamped() {
        let p = RetryPolicy::new().with_initial_delay(Duration::ZERO);
        assert_eq!(p.initial_delay, MIN_INITIAL_DELAY);
        assert_eq!(p.backoff(1), MIN_INITIAL_DELAY);
        assert_eq!(p.backoff(3), MIN_INITIAL_DELAY * 4);
    }

    #[test]
    fn test_default_budget_is_ten_seconds() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_elapsed, Duration::from_secs(10));
        assert!(p.max_attempts.is_none());
        assert!((p.retry_on)(&Error::rate_limited("x", None)));
        assert!(!(p.retry_on)(&Error::invalid_input("x")));
    }

    #[tokio::test]
    async fn test_always_rate_limited_gives_up_within_budget() {
        let policy = fast_policy(120);
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        let res: Result<()> = policy
            .run("always_429", &json!({}), || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::rate_limited("429", None))
            })
            .await;

        let err = res.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(attempts.load(Ordering::SeqCst) >= 2);
        // Budget plus scheduling slack.
        assert!(start.elapsed() < Duration::from_millis(120 + 250));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_rate_limits() {
        let policy = fast_policy(2_000);
        let attempts = AtomicU32::new(0);

        let res = policy
            .run("flaky", &json!({"n": 1}), || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Error::rate_limited("429", None))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(res.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let policy = fast_policy(2_000);
        let attempts = AtomicU32::new(0);

        let res: Result<()> = policy
            .run("bad_input", &json!({}), || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::invalid_input("nope"))
            })
            .await;

        assert!(matches!(res, Err(Error::InvalidInput { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_limit() {
        let policy = fast_policy(2_000).with_max_attempts(2);
        let attempts = AtomicU32::new(0);
        let res: Result<()> = policy
            .run("limited", &json!({}), || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::rate_limited("429", None))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_budget_still_makes_one_attempt() {
        let policy = fast_policy(0);
        let attempts = AtomicU32::new(0);
        let res: Result<()> = policy
            .run("no_budget", &json!({}), || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::rate_limited("429", None))
            })
            .await;
        assert!(res.unwrap_err().is_rate_limited());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
