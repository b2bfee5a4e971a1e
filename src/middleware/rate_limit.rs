//! Client-side quota enforcement.

use std::sync::Arc;

use http::Extensions;
use reqwest::header::HeaderMap;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use tokio_util::sync::CancellationToken;

use crate::client::RequestOptions;
use crate::error::RestError;
use crate::middleware::{AttemptCount, chain_error, is_unsent, pause};
use crate::rate_limit::{
    BucketKey, BucketResolver, Pacer, QuotaStore, RateLimitConfig, ServerQuota, WaitPolicy,
};

/// Access to the quota bucket of one in-flight request.
///
/// The rate limiter stores this in the request extensions so inner layers
/// can charge, refund and reconcile the same bucket.
#[derive(Debug, Clone)]
pub struct QuotaHandle {
    store: QuotaStore,
    key: BucketKey,
    wait_policy: WaitPolicy,
    cancellation: Option<CancellationToken>,
}

impl QuotaHandle {
    /// Handle on `key` in `store`, honoring `wait_policy` when the bucket is empty.
    pub fn new(
        store: QuotaStore,
        key: BucketKey,
        wait_policy: WaitPolicy,
        cancellation: Option<CancellationToken>,
    ) -> Self {
        Self {
            store,
            key,
            wait_policy,
            cancellation,
        }
    }

    /// The bucket this request is charged to.
    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Charge one request, waiting or failing per the wait policy.
    pub async fn acquire(&self) -> Result<(), RestError> {
        loop {
            let throttle = match self.store.try_acquire(&self.key).await {
                Ok(()) => return Ok(()),
                Err(throttle) => throttle,
            };

            match self.wait_policy {
                WaitPolicy::FailFast => {
                    tracing::debug!(bucket = %self.key, "quota exhausted, failing fast");
                    return Err(RestError::QuotaExceeded {
                        bucket: self.key.clone(),
                        retry_after: Some(throttle.retry_in),
                    });
                }
                WaitPolicy::Wait => {
                    tracing::info!(
                        bucket = %self.key,
                        wait_ms = throttle.retry_in.as_millis() as u64,
                        "quota exhausted, waiting for reset"
                    );
                    pause(throttle.retry_in, self.cancellation.as_ref()).await?;
                }
            }
        }
    }

    /// Return one unit for a request that never reached the server.
    pub async fn refund(&self) {
        self.store.refund(&self.key).await;
    }

    /// Fold server quota headers into the bucket.
    pub async fn reconcile(&self, headers: &HeaderMap) {
        if let Some(server) = ServerQuota::from_headers(headers) {
            self.store.reconcile(&self.key, &server).await;
        }
    }
}

/// Enforces per-bucket quotas before requests go out.
#[derive(Debug, Clone)]
pub struct RateLimitMiddleware {
    store: QuotaStore,
    resolver: BucketResolver,
    wait_policy: WaitPolicy,
    pacer: Option<Arc<Pacer>>,
}

impl RateLimitMiddleware {
    /// Limiter over `store`. Pacing is enabled when `pace_per_second` is set.
    pub fn new(store: QuotaStore, config: &RateLimitConfig) -> Self {
        Self {
            store,
            resolver: BucketResolver::new(config.bucket_overrides.clone()),
            wait_policy: config.wait_policy,
            pacer: config
                .pace_per_second
                .map(|rate| Arc::new(Pacer::per_second(rate))),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let options = extensions
            .get::<RequestOptions>()
            .cloned()
            .unwrap_or_default();
        let key = self.resolver.resolve_request(&req, options.bucket.as_deref());
        let handle = QuotaHandle::new(
            self.store.clone(),
            key,
            options.wait_policy.unwrap_or(self.wait_policy),
            options.cancellation,
        );

        if let Some(pacer) = &self.pacer {
            match &handle.cancellation {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(chain_error(RestError::Cancelled)),
                    _ = pacer.until_ready(handle.key()) => {}
                },
                None => pacer.until_ready(handle.key()).await,
            }
        }

        handle.acquire().await.map_err(chain_error)?;
        extensions.insert(handle.clone());

        let result = next.run(req, extensions).await;

        match &result {
            Ok(response) => handle.reconcile(response.headers()).await,
            // Without a retry layer nobody else refunds the unsent request.
            Err(err) if is_unsent(err) && extensions.get::<AttemptCount>().is_none() => {
                handle.refund().await;
            }
            Err(_) => {}
        }

        result
    }
}
