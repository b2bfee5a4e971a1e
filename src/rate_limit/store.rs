//! Shared quota state for all buckets.
//!
//! The store is the only cross-request mutable state in the pipeline. Each
//! operation takes the lock once, so check-and-decrement is atomic: two
//! callers can never both observe the last unit of budget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::rate_limit::{BucketKey, QuotaSnapshot, QuotaTracker, RateLimitConfig, ServerQuota, Throttle};

/// Concurrent map from bucket key to quota state.
///
/// Cloning is cheap and clones share state. Construct one per independent
/// pipeline and inject it; nothing here is global.
#[derive(Debug, Clone, Default)]
pub struct QuotaStore {
    buckets: Arc<Mutex<HashMap<BucketKey, QuotaTracker>>>,
    /// Template for buckets created on first use
    template: QuotaTracker,
}

impl QuotaStore {
    /// Create a store whose buckets start `Unknown`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose buckets enforce a local budget until the server reports.
    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            buckets: Arc::default(),
            template: QuotaTracker::with_window(limit, window),
        }
    }

    /// Create a store from rate limit configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        match config.requests_per_window {
            Some(limit) => Self::with_window(limit, config.window),
            None => Self::new(),
        }
    }

    /// Atomically check and charge one request against a bucket.
    pub async fn try_acquire(&self, key: &BucketKey) -> Result<(), Throttle> {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(key.clone())
            .or_insert_with(|| self.template.clone())
            .try_acquire()
    }

    /// Return a charge for a request that never reached the server.
    pub async fn refund(&self, key: &BucketKey) {
        let mut buckets = self.buckets.lock().await;
        if let Some(tracker) = buckets.get_mut(key) {
            tracker.refund_at(std::time::Instant::now());
        }
    }

    /// Apply server-reported quota values to a bucket.
    pub async fn reconcile(&self, key: &BucketKey, server: &ServerQuota) {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(key.clone())
            .or_insert_with(|| self.template.clone())
            .reconcile_at(server, std::time::Instant::now());
    }

    /// Read-only view of a bucket, if it has been used.
    pub async fn snapshot(&self, key: &BucketKey) -> Option<QuotaSnapshot> {
        self.buckets.lock().await.get(key).map(QuotaTracker::snapshot)
    }

    /// Get the number of buckets being tracked.
    pub async fn tracked_buckets(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{BucketState, resolve_bucket};

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let store = QuotaStore::with_window(1, Duration::from_secs(60));
        let a = resolve_bucket("api.example.com", Some("tenant-a"));
        let b = resolve_bucket("api.example.com", Some("tenant-b"));

        assert!(store.try_acquire(&a).await.is_ok());
        assert!(store.try_acquire(&a).await.is_err());
        assert!(store.try_acquire(&b).await.is_ok());
        assert_eq!(store.tracked_buckets().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_last_unit_goes_to_one_caller() {
        let store = QuotaStore::new();
        let key = BucketKey::named("shared");
        store
            .reconcile(
                &key,
                &ServerQuota {
                    remaining: Some(1),
                    limit: Some(2),
                    reset_after: Some(Duration::from_secs(60)),
                },
            )
            .await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move { store.try_acquire(&key).await })
            })
            .collect();

        let mut granted = 0;
        let mut throttled = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => granted += 1,
                Err(_) => throttled += 1,
            }
        }

        assert_eq!(granted, 1);
        assert_eq!(throttled, 1);
        let snapshot = store.snapshot(&key).await.unwrap();
        assert_eq!(snapshot.remaining, Some(0));
        assert_eq!(snapshot.state, BucketState::Throttled);
    }

    #[tokio::test]
    async fn test_many_concurrent_callers_never_overshoot() {
        let store = QuotaStore::with_window(10, Duration::from_secs(60));
        let key = BucketKey::named("burst");

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move { store.try_acquire(&key).await.is_ok() })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
    }

    #[tokio::test]
    async fn test_refund_unknown_bucket_is_noop() {
        let store = QuotaStore::new();
        store.refund(&BucketKey::named("never-used")).await;
        assert_eq!(store.tracked_buckets().await, 0);
    }
}
