//! Server-reported quota headers.

use std::time::Duration;

use reqwest::header::HeaderMap;
use time::OffsetDateTime;

/// Header names carrying the remaining budget, in lookup order.
pub const REMAINING_HEADERS: &[&str] = &[
    "x-ratelimit-remaining",
    "x-rate-limit-remaining",
    "ratelimit-remaining",
];

/// Header names carrying the window capacity.
pub const LIMIT_HEADERS: &[&str] = &["x-ratelimit-limit", "x-rate-limit-limit", "ratelimit-limit"];

/// Header names carrying the window reset.
pub const RESET_HEADERS: &[&str] = &["x-ratelimit-reset", "x-rate-limit-reset", "ratelimit-reset"];

/// Reset values above this are unix timestamps rather than delta seconds.
const EPOCH_THRESHOLD: f64 = 1_000_000_000.0;

/// Authoritative quota values reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerQuota {
    /// Requests left in the current window
    pub remaining: Option<u32>,
    /// Window capacity
    pub limit: Option<u32>,
    /// Time until the window refreshes, measured when the headers were parsed
    pub reset_after: Option<Duration>,
}

impl ServerQuota {
    /// Parse quota headers. Returns `None` when the response carries none.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let quota = Self {
            remaining: first_number(headers, REMAINING_HEADERS).map(to_count),
            limit: first_number(headers, LIMIT_HEADERS).map(to_count),
            reset_after: first_number(headers, RESET_HEADERS).and_then(to_reset_after),
        };

        if quota == Self::default() {
            None
        } else {
            Some(quota)
        }
    }
}

fn first_number(headers: &HeaderMap, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
    })
}

// Fractional budgets floor, negative ones clamp to zero.
fn to_count(value: f64) -> u32 {
    value.floor().clamp(0.0, u32::MAX as f64) as u32
}

// Resets too far out to represent are dropped.
fn to_reset_after(value: f64) -> Option<Duration> {
    let seconds = if value > EPOCH_THRESHOLD {
        value - OffsetDateTime::now_utc().unix_timestamp() as f64
    } else {
        value
    };
    Duration::try_from_secs_f64(seconds.max(0.0)).ok()
}
