//! Per-bucket quota state machine.
//!
//! ```text
//! Unknown -> Tracking <-> Throttled
//! ```
//!
//! - `Unknown`: no server data and no local window; requests pass untouched.
//! - `Tracking`: a believed `remaining` is decremented on every send.
//! - `Throttled`: `remaining` hit zero before a known reset time.
//!
//! Server-reported values always replace the local estimate.

use std::time::{Duration, Instant};

use crate::rate_limit::ServerQuota;

/// Observable state of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// Nothing known yet.
    Unknown,
    /// Budget is being tracked.
    Tracking,
    /// Budget exhausted until the window resets.
    Throttled,
}

/// Returned when a bucket has no budget left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    /// Time until the window resets.
    pub retry_in: Duration,
}

/// Read-only view of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    /// Current state
    pub state: BucketState,
    /// Believed remaining budget
    pub remaining: Option<u32>,
    /// Window capacity
    pub limit: Option<u32>,
    /// Time until the window resets
    pub reset_in: Option<Duration>,
}

/// Quota state for a single bucket.
#[derive(Debug, Clone, Default)]
pub struct QuotaTracker {
    /// Believed remaining budget (None = unknown)
    remaining: Option<u32>,
    /// Window capacity
    limit: Option<u32>,
    /// When the current window refreshes
    reset_at: Option<Instant>,
    /// Local window length, opened on the first charge when the server gives no reset
    window: Option<Duration>,
}

impl QuotaTracker {
    /// Create a tracker with no knowledge of the quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker that enforces a local budget of `limit` per `window`
    /// until the server reports its own values.
    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            remaining: Some(limit),
            limit: Some(limit),
            reset_at: None,
            window: Some(window),
        }
    }

    /// Roll the window over if its reset time has passed.
    fn refresh(&mut self, now: Instant) {
        if self.reset_at.is_some_and(|reset_at| now >= reset_at) {
            self.reset_at = None;
            self.remaining = self.limit;
        }
    }

    /// Try to charge one request against the budget.
    ///
    /// Passes without charging while the bucket is `Unknown`. With zero
    /// remaining and no known reset time the request is let through
    /// (fail-open).
    pub fn try_acquire_at(&mut self, now: Instant) -> Result<(), Throttle> {
        self.refresh(now);

        match self.remaining {
            None => Ok(()),
            Some(0) => match self.reset_at {
                Some(reset_at) => Err(Throttle {
                    retry_in: reset_at.saturating_duration_since(now),
                }),
                None => Ok(()),
            },
            Some(n) => {
                self.remaining = Some(n - 1);
                if self.reset_at.is_none() {
                    self.reset_at = self.window.map(|window| now + window);
                }
                Ok(())
            }
        }
    }

    /// Return a charge for a request that never reached the server.
    pub fn refund_at(&mut self, now: Instant) {
        self.refresh(now);

        if let Some(remaining) = self.remaining {
            let refunded = remaining.saturating_add(1);
            self.remaining = Some(match self.limit {
                Some(limit) => refunded.min(limit),
                None => refunded,
            });
        }
    }

    /// Replace the local estimate with server-reported values.
    pub fn reconcile_at(&mut self, server: &ServerQuota, now: Instant) {
        if let Some(limit) = server.limit {
            self.limit = Some(limit);
        }
        if let Some(remaining) = server.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_at) = server.reset_after.and_then(|after| now.checked_add(after)) {
            self.reset_at = Some(reset_at);
        }
    }

    /// Current state.
    pub fn state_at(&self, now: Instant) -> BucketState {
        let window_open = self.reset_at.is_some_and(|reset_at| now < reset_at);
        match self.remaining {
            None => BucketState::Unknown,
            Some(0) if window_open => BucketState::Throttled,
            Some(_) if !window_open && self.reset_at.is_some() && self.limit.is_none() => {
                BucketState::Unknown
            }
            Some(_) => BucketState::Tracking,
        }
    }

    /// Read-only view.
    pub fn snapshot_at(&self, now: Instant) -> QuotaSnapshot {
        let expired = self.reset_at.is_some_and(|reset_at| now >= reset_at);
        QuotaSnapshot {
            state: self.state_at(now),
            remaining: if expired { self.limit } else { self.remaining },
            limit: self.limit,
            reset_in: self
                .reset_at
                .filter(|_| !expired)
                .map(|reset_at| reset_at.saturating_duration_since(now)),
        }
    }

    /// Try to charge one request now.
    pub fn try_acquire(&mut self) -> Result<(), Throttle> {
        self.try_acquire_at(Instant::now())
    }

    /// Current read-only view.
    pub fn snapshot(&self) -> QuotaSnapshot {
        self.snapshot_at(Instant::now())
    }
}
