//! The request pipeline as a `reqwest-middleware` chain.
//!
//! Layers run in a fixed order, outermost first:
//!
//! 1. [`ContextMiddleware`] adds authentication, tenant headers and masquerading
//! 2. [`LoggingMiddleware`] opens a span per logical request with secrets redacted
//! 3. [`RateLimitMiddleware`] charges the bucket, waits or fails fast
//! 4. [`RetryMiddleware`] repeats transient failures with backoff
//!
//! The retry layer sits inside the rate limiter, so every retry is charged to
//! the bucket again through the [`QuotaHandle`] the limiter leaves in the
//! request extensions.

mod context;
mod logging;
mod rate_limit;
mod retry;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::RestError;

pub use context::{ContextMiddleware, MASQUERADE_PARAM};
pub use logging::{
    LoggingMiddleware, REDACTED, RedactingSpanBackend, redact_headers, redact_url,
};
pub use rate_limit::{QuotaHandle, RateLimitMiddleware};
pub use retry::{AttemptCount, RetryMiddleware};

/// Sleep for `delay`, returning early with [`RestError::Cancelled`] if the token fires.
pub(crate) async fn pause(
    delay: Duration,
    cancellation: Option<&CancellationToken>,
) -> Result<(), RestError> {
    match cancellation {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(RestError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

/// Carry a pipeline error through the middleware chain.
///
/// The executor downcasts it back to [`RestError`].
pub(crate) fn chain_error(error: RestError) -> reqwest_middleware::Error {
    reqwest_middleware::Error::Middleware(anyhow::Error::new(error))
}

/// Whether the request never reached the server.
pub(crate) fn is_unsent(error: &reqwest_middleware::Error) -> bool {
    matches!(error, reqwest_middleware::Error::Reqwest(e) if e.is_connect())
}
