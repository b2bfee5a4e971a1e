//! Example: Quota buckets and the shared quota store.
//!
//! Run with: cargo run --example rate_limit

use std::time::Duration;

use rest_resilience::rate_limit::{QuotaStore, QuotaTracker, ServerQuota, resolve_bucket};

#[tokio::main]
async fn main() {
    // Bucket keys isolate hosts and credentials without storing the token.
    let instructor = resolve_bucket("canvas.example.edu", Some("instructor-token"));
    let learner = resolve_bucket("canvas.example.edu", Some("learner-token"));
    let anonymous = resolve_bucket("canvas.example.edu", None);
    println!("Instructor bucket:   {}", instructor);
    println!("Learner bucket:   {}", learner);
    println!("Anonymous bucket: {}", anonymous);

    // A single tracker with a local budget of 2 per second.
    let mut tracker = QuotaTracker::with_window(2, Duration::from_secs(1));
    println!("Acquire #1: {:?}", tracker.try_acquire());
    println!("Acquire #2: {:?}", tracker.try_acquire());
    println!("Acquire #3: {:?}", tracker.try_acquire());
    println!("Snapshot: {:?}", tracker.snapshot());

    // Server headers replace the local estimate.
    let store = QuotaStore::with_window(700, Duration::from_secs(60));
    store.try_acquire(&instructor).await.ok();
    store
        .reconcile(
            &instructor,
            &ServerQuota {
                remaining: Some(3),
                limit: Some(700),
                reset_after: Some(Duration::from_secs(10)),
            },
        )
        .await;
    println!("Instructor after reconcile: {:?}", store.snapshot(&instructor).await);
    println!("Tracked buckets: {}", store.tracked_buckets().await);
}
