//! Bounded retry with exponential backoff.
//!
//! Only transient failures are retried: connection errors, 5xx and 429.
//! Other 4xx responses are final. Writes (POST/PATCH) are not retried unless
//! the caller opts in, since a blind retry may duplicate a created resource.
//!
//! ## Backoff
//!
//! ```text
//! delay = min(max_delay, base_delay * 2^(attempt - 1) + jitter)
//! ```
//!
//! A 429 carrying `Retry-After` waits exactly as long as the server asks, as
//! long as that is within `max_delay`. Longer hints end the retry loop and
//! surface as [`RestError::TooManyRequests`](crate::RestError::TooManyRequests).

mod policy;
mod retry_after;

use std::time::Duration;

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};

pub use policy::{Failure, RetryDecision, RetryPolicy, is_idempotent, is_retryable_status};
pub use retry_after::parse_retry_after;

/// Retry configuration.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Whether to retry at all.
    pub enabled: bool,
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay after the first failure.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "base_delay_ms")]
    pub base_delay: Duration,
    /// Ceiling for computed delays.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_delay_ms")]
    pub max_delay: Duration,
    /// Upper bound of random jitter.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "jitter_ms")]
    pub jitter: Duration,
    /// Retry POST/PATCH too.
    pub retry_non_idempotent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(100),
            retry_non_idempotent: false,
        }
    }
}
