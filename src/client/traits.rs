//! Trait definition for request executors.
//!
//! This module provides the [`Execute`] trait which abstracts sending one
//! logical request. The paginator is written against it, which enables:
//! - Mock executors in tests
//! - Wrapping a client with decorators
//!
//! # Example
//!
//! ```rust,ignore
//! use rest_resilience::client::{ApiRequest, Execute};
//!
//! async fn course_count<E: Execute>(executor: &E) -> Result<usize, rest_resilience::RestError> {
//!     let response = executor.execute(ApiRequest::get("/courses")).await?;
//!     Ok(response.json::<Vec<serde_json::Value>>()?.len())
//! }
//! ```

use std::future::Future;

use crate::client::{ApiRequest, ApiResponse};
use crate::error::RestError;

/// Sends one logical request through the pipeline.
pub trait Execute: Send + Sync {
    /// Execute `request`, returning the final response or a classified error.
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, RestError>> + Send;
}
