//! Retry decisions as plain data.
//!
//! [`RetryPolicy::should_retry`] performs no I/O and never sleeps; the retry
//! middleware acts on the returned [`RetryDecision`].

use std::time::Duration;

use reqwest::{Method, StatusCode};

use crate::retry::RetryConfig;

/// A failed attempt, as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Connection-level failure classified as transient.
    Transport,
    /// The server answered with a non-success status.
    Status {
        /// Response status
        status: StatusCode,
        /// Parsed `Retry-After` hint
        retry_after: Option<Duration>,
    },
}

impl Failure {
    /// Whether this failure class is ever retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport => true,
            Self::Status { status, .. } => is_retryable_status(*status),
        }
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether to try again
    pub retry: bool,
    /// How long to wait first
    pub delay: Duration,
}

impl RetryDecision {
    /// Do not retry.
    pub const STOP: Self = Self {
        retry: false,
        delay: Duration::ZERO,
    };

    /// Retry after `delay`.
    pub fn after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }
}

/// Whether a status is worth retrying: 429 and every 5xx.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Whether a method can be repeated without duplicating side effects.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE | Method::PUT | Method::DELETE
    )
}

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    max_attempts: u32,
    /// Delay after the first failure
    base_delay: Duration,
    /// Ceiling for computed delays
    max_delay: Duration,
    /// Upper bound of the random jitter added to each delay
    jitter: Duration,
    /// Retry POST/PATCH as well
    retry_non_idempotent: bool,
}

impl RetryPolicy {
    /// Create a policy from configuration.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: if config.enabled {
                config.max_attempts.max(1)
            } else {
                1
            },
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter: config.jitter,
            retry_non_idempotent: config.retry_non_idempotent,
        }
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the attempt following failed attempt `attempt` (1-based),
    /// before jitter: `min(ceiling, base * 2^(attempt - 1))`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Backoff with jitter, never above the ceiling.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis().min(u64::MAX as u128) as u64;
        let jitter = Duration::from_millis(fastrand::u64(0..=jitter_ms));
        (self.base_backoff(attempt) + jitter).min(self.max_delay)
    }

    /// Decide what to do after attempt number `attempt` (1-based) failed.
    ///
    /// `allow_writes` overrides the configured write policy for this request.
    /// A 429 asking to wait longer than `max_delay` is not retried, so the
    /// caller sees the hint instead of a suspended request.
    pub fn should_retry(
        &self,
        attempt: u32,
        method: &Method,
        failure: &Failure,
        allow_writes: Option<bool>,
    ) -> RetryDecision {
        if attempt >= self.max_attempts || !failure.is_retryable() {
            return RetryDecision::STOP;
        }
        if !is_idempotent(method) && !allow_writes.unwrap_or(self.retry_non_idempotent) {
            return RetryDecision::STOP;
        }

        match failure {
            Failure::Status {
                status: StatusCode::TOO_MANY_REQUESTS,
                retry_after: Some(hint),
            } if *hint > self.max_delay => {
                tracing::debug!(
                    retry_after_ms = hint.as_millis() as u64,
                    max_delay_ms = self.max_delay.as_millis() as u64,
                    "retry-after exceeds ceiling, not retrying"
                );
                RetryDecision::STOP
            }
            Failure::Status {
                status: StatusCode::TOO_MANY_REQUESTS,
                retry_after: Some(hint),
            } => RetryDecision::after(*hint),
            _ => RetryDecision::after(self.backoff(attempt)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
