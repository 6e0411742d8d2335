//! # Resilience Module
//!
//! Retry handling for rate-limited remote calls.
//!
//! [`RetryPolicy`] is invoked imperatively around the cache-backed call. It
//! retries only errors its predicate accepts (by default
//! [`Error::is_rate_limited`](crate::Error::is_rate_limited)), sleeping an
//! exponentially growing delay between attempts, and gives up once the total
//! elapsed time reaches its budget (10 seconds by default).
//!
//! ```rust
//! use std::time::Duration;
//! use vision_lm::resilience::RetryPolicy;
//!
//! let policy = RetryPolicy::new()
//!     .with_initial_delay(Duration::from_millis(250))
//!     .with_max_elapsed(Duration::from_secs(5));
//! assert_eq!(policy.backoff(3), Duration::from_secs(1));
//! ```

pub mod retry;

pub use retry::{RetryPolicy, RetryPredicate, DEFAULT_MAX_ELAPSED, MIN_INITIAL_DELAY};
