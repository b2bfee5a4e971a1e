//! REST client implementation.

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use http::Extensions;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::{CredentialsProvider, EnvCredentials};
use crate::client::traits::Execute;
use crate::client::{ApiRequest, ApiResponse, RequestBody};
use crate::config::ClientConfig;
use crate::error::RestError;
use crate::middleware::{
    AttemptCount, ContextMiddleware, LoggingMiddleware, RateLimitMiddleware, RetryMiddleware,
};
use crate::pagination::{Page, PaginationConfig, Paginator};
use crate::rate_limit::{BucketKey, QuotaSnapshot, QuotaStore, RateLimitConfig, WaitPolicy};
use crate::retry::{RetryConfig, RetryPolicy};

/// A REST client with rate limiting, retries and pagination.
///
/// Every request passes through the same middleware chain: context headers,
/// redacted logging, the rate limiter and the retry layer. Clones share the
/// connection pool and the quota store.
///
/// # Example
///
/// ```rust,no_run
/// use rest_resilience::client::{ApiRequest, RestClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = RestClient::builder()
///         .base_url("https://canvas.example.edu/api/v1")
///         .build()?;
///
///     let response = client.execute(ApiRequest::get("/courses/1")).await?;
///     println!("Course: {}", response.text());
///
///     Ok(())
/// }
/// ```
///
/// With a bearer token and a shared bucket:
///
/// ```rust,no_run
/// use rest_resilience::auth::StaticCredentials;
/// use rest_resilience::client::{ApiRequest, RestClient};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = RestClient::builder()
///         .base_url("https://canvas.example.edu/api/v1")
///         .credentials(Arc::new(StaticCredentials::new("token")))
///         .build()?;
///
///     let users: Vec<serde_json::Value> = client
///         .collect_all(ApiRequest::get("/accounts/1/users").bucket("admin"))
///         .await?;
///     println!("Users: {}", users.len());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RestClient {
    http_client: ClientWithMiddleware,
    base_url: String,
    quota: QuotaStore,
    pagination: PaginationConfig,
}

impl RestClient {
    /// Create a new client builder.
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::new()
    }

    /// Create a client from deserialized configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self, RestError> {
        RestClientBuilder::from_config(config)?.build()
    }

    /// The base URL relative paths are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The quota store shared by all clones of this client.
    pub fn quota_store(&self) -> &QuotaStore {
        &self.quota
    }

    /// Read-only view of a bucket's quota, if the bucket has been used.
    pub async fn quota(&self, key: &BucketKey) -> Option<QuotaSnapshot> {
        self.quota.snapshot(key).await
    }

    /// Resolve a request path to a URL. Absolute URLs are used as-is.
    pub fn resolve_url(&self, path: &str) -> Result<Url, RestError> {
        let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }

        let base = self.base_url.trim_end_matches('/');
        let url = if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        Ok(Url::parse(&url)?)
    }

    /// Execute a request through the pipeline.
    ///
    /// Returns the final response for 1xx-3xx statuses. Errors carry the
    /// number of attempts made.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RestError> {
        let ApiRequest {
            method,
            path,
            query,
            headers,
            body,
            options,
        } = request;

        let url = self.resolve_url(&path)?;
        let mut builder = self.http_client.request(method, url).headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        builder = match body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Form(form)) => builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form),
            Some(RequestBody::Bytes { data, content_type }) => {
                builder.header(CONTENT_TYPE, content_type).body(data)
            }
        };
        let http_request = builder.build()?;

        let cancellation = options.cancellation.clone();
        let deadline = options.timeout;
        let mut extensions = Extensions::new();
        extensions.insert(options);

        let work = async {
            let outcome = self
                .http_client
                .execute_with_extensions(http_request, &mut extensions)
                .await;
            let attempts = extensions
                .get::<AttemptCount>()
                .map_or(1, |count| count.0);
            match outcome {
                Ok(response) => ApiResponse::read(response, attempts).await,
                Err(err) => Err(from_chain_error(err, attempts)),
            }
        };

        let response = tokio::select! {
            biased;
            _ = cancelled(cancellation.as_ref()) => Err(RestError::Cancelled),
            _ = expired(deadline) => Err(RestError::Timeout),
            result = work => result,
        }?;

        response.error_for_status()
    }

    /// A paginator over this client.
    pub fn paginator(&self) -> Paginator<'_, Self> {
        Paginator::new(self, self.pagination.clone())
    }

    /// Fetch the first page of a collection.
    pub async fn first_page<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Page<T>, RestError> {
        self.paginator().first_page(request).await
    }

    /// Fetch the page after `page`, or `None` at the end.
    pub async fn next_page<T: DeserializeOwned>(
        &self,
        page: &Page<T>,
    ) -> Result<Option<Page<T>>, RestError> {
        self.paginator().next_page(page).await
    }

    /// Lazily stream pages of a collection.
    pub fn pages<T>(&self, request: ApiRequest) -> impl Stream<Item = Result<Page<T>, RestError>>
    where
        T: DeserializeOwned + Send,
    {
        self.paginator().pages(request)
    }

    /// Lazily stream items across all pages of a collection.
    pub fn all<T>(&self, request: ApiRequest) -> impl Stream<Item = Result<T, RestError>>
    where
        T: DeserializeOwned + Send,
    {
        self.paginator().all(request)
    }

    /// Collect every item of a collection.
    pub async fn collect_all<T>(&self, request: ApiRequest) -> Result<Vec<T>, RestError>
    where
        T: DeserializeOwned + Send,
    {
        self.paginator().collect_all(request).await
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}

impl Execute for RestClient {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RestError> {
        RestClient::execute(self, request).await
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn expired(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

fn from_chain_error(error: reqwest_middleware::Error, attempts: u32) -> RestError {
    match error {
        reqwest_middleware::Error::Middleware(inner) => match inner.downcast::<RestError>() {
            Ok(error) => error,
            Err(inner) => RestError::HttpMiddleware(reqwest_middleware::Error::Middleware(inner)),
        },
        reqwest_middleware::Error::Reqwest(source) => RestError::Transport { attempts, source },
    }
}

/// Builder for [`RestClient`].
pub struct RestClientBuilder {
    base_url: String,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    user_agent: Option<String>,
    default_headers: HeaderMap,
    rate_limit: RateLimitConfig,
    retry: RetryConfig,
    pagination: PaginationConfig,
    quota_store: Option<QuotaStore>,
    http_client: Option<reqwest::Client>,
}

impl RestClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: String::new(),
            credentials: None,
            user_agent: None,
            default_headers: HeaderMap::new(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            pagination: PaginationConfig::default(),
            quota_store: None,
            http_client: None,
        }
    }

    /// Create a builder from deserialized configuration.
    ///
    /// Reads the bearer token from `token_env` when that variable is set.
    pub fn from_config(config: ClientConfig) -> Result<Self, RestError> {
        let mut builder = Self::new()
            .base_url(config.base_url)
            .rate_limit(config.rate_limit)
            .retry(config.retry)
            .pagination(config.pagination);

        if let Some(user_agent) = config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        for (name, value) in config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RestError::InvalidRequest(format!("header name {name:?}: {e}")))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|e| RestError::InvalidRequest(format!("header {name:?}: {e}")))?;
            builder = builder.header(header_name, header_value);
        }

        if let Some(var) = config.token_env {
            match EnvCredentials::try_from_env_var(&var) {
                Some(credentials) => builder = builder.credentials(Arc::new(credentials)),
                None => tracing::warn!(var = %var, "token variable not set, sending unauthenticated"),
            }
        }

        Ok(builder)
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the credentials provider for authenticated requests.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a header sent with every request unless the request sets it.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Set the rate limiter configuration.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Set the default throttling behaviour.
    pub fn wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.rate_limit.wait_policy = policy;
        self
    }

    /// Set the retry configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Set the total attempts per request, including the first.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    /// Set the pagination configuration.
    pub fn pagination(mut self, config: PaginationConfig) -> Self {
        self.pagination = config;
        self
    }

    /// Share a quota store with other clients.
    pub fn quota_store(mut self, store: QuotaStore) -> Self {
        self.quota_store = Some(store);
        self
    }

    /// Use a preconfigured transport.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<RestClient, RestError> {
        if self.base_url.is_empty() {
            return Err(RestError::InvalidRequest("base URL is required".to_string()));
        }
        Url::parse(&self.base_url)?;

        let mut headers = self.default_headers;
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("rest-resilience/{}", env!("CARGO_PKG_VERSION")));
        if !headers.contains_key(USER_AGENT) {
            let header_value = HeaderValue::from_str(&user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("rest-resilience"));
            headers.insert(USER_AGENT, header_value);
        }

        let reqwest_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build()?,
        };

        let quota = self
            .quota_store
            .unwrap_or_else(|| QuotaStore::from_config(&self.rate_limit));

        let mut chain = ClientBuilder::new(reqwest_client)
            .with(ContextMiddleware::new(self.credentials, headers))
            .with(LoggingMiddleware::new());
        if self.rate_limit.enabled {
            chain = chain.with(RateLimitMiddleware::new(quota.clone(), &self.rate_limit));
        }
        let http_client = chain
            .with(RetryMiddleware::new(RetryPolicy::new(&self.retry)))
            .build();

        Ok(RestClient {
            http_client,
            base_url: self.base_url,
            quota,
            pagination: self.pagination,
        })
    }
}

impl Default for RestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RestClient {
        RestClient::builder().base_url(base).build().unwrap()
    }

    #[test]
    fn test_resolve_url_joins_paths() {
        let client = client("https://api.example/v1/");
        assert_eq!(
            client.resolve_url("/courses").unwrap().as_str(),
            "https://api.example/v1/courses"
        );
        assert_eq!(
            client.resolve_url("courses?page=2").unwrap().as_str(),
            "https://api.example/v1/courses?page=2"
        );
        assert_eq!(
            client
                .resolve_url("https://other.example/x?page=3")
                .unwrap()
                .as_str(),
            "https://other.example/x?page=3"
        );
    }

    #[test]
    fn test_build_requires_base_url() {
        assert!(matches!(
            RestClient::builder().build(),
            Err(RestError::InvalidRequest(_))
        ));
        assert!(matches!(
            RestClient::builder().base_url("not a url").build(),
            Err(RestError::Url(_))
        ));
    }

    #[test]
    fn test_from_config_rejects_bad_header() {
        let config = ClientConfig::from_json(
            r#"{"base_url": "https://api.example", "headers": {"bad header": "x"}}"#,
        )
        .unwrap();
        assert!(matches!(
            RestClientBuilder::from_config(config),
            Err(RestError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let client = client("http://127.0.0.1:9");
        let token = CancellationToken::new();
        token.cancel();

        let result = client
            .execute(ApiRequest::get("/x").cancel_with(token))
            .await;
        assert!(matches!(result, Err(RestError::Cancelled)));
    }
}
