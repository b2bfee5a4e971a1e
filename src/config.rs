//! Client configuration.
//!
//! Every section is optional in serialized form and falls back to its
//! defaults. Durations are expressed in milliseconds.
//!
//! ```json
//! {
//!   "base_url": "https://canvas.example.edu/api/v1",
//!   "token_env": "CANVAS_TOKEN",
//!   "headers": { "x-tenant": "district-7" },
//!   "rate_limit": { "requests_per_window": 700, "window_ms": 60000, "wait_policy": "fail_fast" },
//!   "retry": { "max_attempts": 5, "base_delay_ms": 250 },
//!   "pagination": { "max_pages": 500 }
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::RestError;
use crate::pagination::PaginationConfig;
use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryConfig;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL relative request paths are joined to.
    pub base_url: String,
    /// User agent override.
    pub user_agent: Option<String>,
    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,
    /// Headers sent with every request.
    pub headers: HashMap<String, String>,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub pagination: PaginationConfig,
}

impl ClientConfig {
    /// Parse configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, RestError> {
        Ok(serde_json::from_str(json)?)
    }
}
