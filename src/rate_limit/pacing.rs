//! Client-side request pacing per bucket.
//!
//! Quota tracking only stops a caller once the window budget is gone, so a
//! burst can still spend the whole window at once. Pacing smooths that burst
//! to a steady rate per bucket.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::rate_limit::BucketKey;

/// Keyed GCRA limiter, one cell stream per bucket.
pub struct Pacer {
    limiter: DefaultKeyedRateLimiter<BucketKey>,
}

impl Pacer {
    /// Allow `rate` requests per second per bucket, with a burst of the same size.
    pub fn per_second(rate: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_second(rate)),
        }
    }

    /// Wait until the bucket may send.
    pub async fn until_ready(&self, key: &BucketKey) {
        self.limiter.until_key_ready(key).await;
    }

    /// Check without waiting. Consumes a cell on success.
    pub fn check(&self, key: &BucketKey) -> bool {
        self.limiter.check_key(key).is_ok()
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("tracked_buckets", &self.limiter.len())
            .finish()
    }
}
