//! Retry layer.

use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use reqwest_retry::{Retryable, default_on_request_failure};

use crate::client::RequestOptions;
use crate::middleware::{QuotaHandle, chain_error, is_unsent, pause};
use crate::retry::{Failure, RetryPolicy, is_retryable_status, parse_retry_after};

/// Attempts made so far for the current logical request.
///
/// Written to the request extensions before every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptCount(pub u32);

/// Repeats transient failures according to a [`RetryPolicy`].
///
/// Every attempt after the first is charged to the request's quota bucket,
/// and attempts that never reached the server are refunded.
#[derive(Debug, Clone, Default)]
pub struct RetryMiddleware {
    policy: RetryPolicy,
}

impl RetryMiddleware {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait::async_trait]
impl Middleware for RetryMiddleware {
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
        let quota = extensions.get::<QuotaHandle>().cloned();
        let method = req.method().clone();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            extensions.insert(AttemptCount(attempt));

            if attempt > 1 {
                if let Some(quota) = &quota {
                    quota.acquire().await.map_err(chain_error)?;
                }
            }

            // Streaming bodies cannot be replayed.
            let Some(request) = req.try_clone() else {
                return next.run(req, extensions).await;
            };

            let outcome = next.clone().run(request, extensions).await;

            let failure = match &outcome {
                Ok(response) if is_retryable_status(response.status()) => Failure::Status {
                    status: response.status(),
                    retry_after: parse_retry_after(response.headers()),
                },
                Ok(_) => return outcome,
                Err(err) => {
                    if is_unsent(err) {
                        if let Some(quota) = &quota {
                            quota.refund().await;
                        }
                    }
                    match default_on_request_failure(err) {
                        Some(Retryable::Transient)
                            if matches!(err, reqwest_middleware::Error::Reqwest(_)) =>
                        {
                            Failure::Transport
                        }
                        _ => return outcome,
                    }
                }
            };

            let decision = self
                .policy
                .should_retry(attempt, &method, &failure, options.retry_writes);
            if !decision.retry {
                return outcome;
            }

            if let (Ok(response), Some(quota)) = (&outcome, &quota) {
                quota.reconcile(response.headers()).await;
            }

            tracing::warn!(
                attempt,
                max_attempts = self.policy.max_attempts(),
                delay_ms = decision.delay.as_millis() as u64,
                failure = ?failure,
                "retrying request"
            );

            drop(outcome);
            pause(decision.delay, options.cancellation.as_ref())
                .await
                .map_err(chain_error)?;
        }
    }
}
