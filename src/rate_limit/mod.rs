//! Quota-aware rate limiting.
//!
//! Remote APIs meter requests per credential and host. This module tracks that
//! budget client-side so requests are held back (or rejected) before the
//! server has to refuse them.
//!
//! ## Components
//!
//! - **Buckets**: a [`BucketKey`] per (host, credential fingerprint), or an explicit name
//! - **Quota tracking**: a [`QuotaTracker`] state machine per bucket, reconciled
//!   against server quota headers
//! - **Store**: a [`QuotaStore`] owning every bucket, injected into the client
//! - **Pacing**: an optional [`Pacer`] smoothing bursts per bucket
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use rest_resilience::rate_limit::{QuotaTracker, resolve_bucket};
//!
//! let key = resolve_bucket("api.example.com", Some("token"));
//! let mut tracker = QuotaTracker::with_window(2, Duration::from_secs(60));
//!
//! assert!(tracker.try_acquire().is_ok());
//! assert!(tracker.try_acquire().is_ok());
//! assert!(tracker.try_acquire().is_err());
//! # let _ = key;
//! ```

mod bucket;
mod headers;
mod pacing;
mod quota;
mod store;

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};

pub use bucket::{ANONYMOUS, BucketKey, BucketResolver, fingerprint, resolve_bucket};
pub use headers::ServerQuota;
pub use pacing::Pacer;
pub use quota::{BucketState, QuotaSnapshot, QuotaTracker, Throttle};
pub use store::QuotaStore;

/// What to do when a bucket is throttled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Block until the window resets.
    #[default]
    Wait,
    /// Fail immediately with [`RestError::QuotaExceeded`](crate::RestError::QuotaExceeded).
    FailFast,
}

/// Rate limiter configuration.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether to enable rate limiting.
    pub enabled: bool,
    /// Local budget per window, used until the server reports its own.
    pub requests_per_window: Option<u32>,
    /// Length of the local window.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "window_ms")]
    pub window: Duration,
    /// Behaviour when a bucket is throttled.
    pub wait_policy: WaitPolicy,
    /// Host to bucket name overrides.
    pub bucket_overrides: HashMap<String, String>,
    /// Smooth requests to at most this many per second per bucket.
    pub pace_per_second: Option<NonZeroU32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: None,
            window: limits::DEFAULT_WINDOW,
            wait_policy: WaitPolicy::Wait,
            bucket_overrides: HashMap::new(),
            pace_per_second: None,
        }
    }
}

/// Rate limit defaults.
pub mod limits {
    use std::time::Duration;

    /// Default local window length.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
}
