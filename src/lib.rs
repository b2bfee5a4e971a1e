//! # REST Resilience
//!
//! An async request pipeline for rate-limited, paginated REST APIs.
//!
//! ## Features
//!
//! - Quota-aware rate limiting with per host/credential bucket isolation
//! - Bounded retry with exponential backoff, jitter and `Retry-After` support
//! - Ordered middleware chain (context headers, redacting logs, rate limit, retry)
//! - Lazy `Link`-header pagination as pages or a flattened item stream
//! - Cancellation tokens and deadlines on every request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rest_resilience::client::{ApiRequest, RestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RestClient::builder()
//!         .base_url("https://api.example.com/v1")
//!         .build()?;
//!
//!     let response = client.execute(ApiRequest::get("/courses")).await?;
//!     println!("Status: {}", response.status());
//!
//!     let courses: Vec<serde_json::Value> =
//!         client.collect_all(ApiRequest::get("/courses")).await?;
//!     println!("Fetched {} courses", courses.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pagination;
pub mod rate_limit;
pub mod retry;

// Re-export commonly used types at crate root
pub use client::{ApiRequest, ApiResponse, Execute, RequestOptions, RestClient};
pub use config::ClientConfig;
pub use error::{ApiError, RestError};
pub use pagination::{Page, PageLinks, Paginator};
pub use rate_limit::{BucketKey, WaitPolicy};

/// Result type alias using RestError
pub type Result<T> = std::result::Result<T, RestError>;
