//! Context headers: authentication, static headers and masquerading.

use std::sync::Arc;

use http::Extensions;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};

use crate::auth::CredentialsProvider;
use crate::client::RequestOptions;
use crate::middleware::chain_error;

/// Query parameter used to act on behalf of another user.
pub const MASQUERADE_PARAM: &str = "as_user_id";

/// Adds request context before anything else sees the request.
///
/// Values already present on the request win over the defaults here.
#[derive(Clone, Default)]
pub struct ContextMiddleware {
    credentials: Option<Arc<dyn CredentialsProvider>>,
    headers: HeaderMap,
}

impl ContextMiddleware {
    pub fn new(credentials: Option<Arc<dyn CredentialsProvider>>, headers: HeaderMap) -> Self {
        Self {
            credentials,
            headers,
        }
    }
}

impl std::fmt::Debug for ContextMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextMiddleware")
            .field("credentials", &self.credentials.is_some())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait::async_trait]
impl Middleware for ContextMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        for (name, value) in self.headers.iter() {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }

        if let Some(provider) = &self.credentials {
            if !req.headers().contains_key(AUTHORIZATION) {
                let value = provider
                    .get_credentials()
                    .authorization_header()
                    .map_err(chain_error)?;
                req.headers_mut().insert(AUTHORIZATION, value);
            }
        }

        let masquerade = extensions
            .get::<RequestOptions>()
            .and_then(|options| options.masquerade_as.clone());
        if let Some(user_id) = masquerade {
            let present = req
                .url()
                .query_pairs()
                .any(|(name, _)| name == MASQUERADE_PARAM);
            if !present {
                req.url_mut()
                    .query_pairs_mut()
                    .append_pair(MASQUERADE_PARAM, &user_id);
            }
        }

        next.run(req, extensions).await
    }
}
