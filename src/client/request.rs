//! Logical requests handed to the executor.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::RestError;
use crate::rate_limit::WaitPolicy;

/// Per-request pipeline options.
///
/// The executor places these in the request extensions so every middleware
/// in the chain can read them.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Explicit quota bucket, overriding the computed one
    pub bucket: Option<String>,
    /// Override the configured throttling behaviour
    pub wait_policy: Option<WaitPolicy>,
    /// Abort the request when this token is cancelled
    pub cancellation: Option<CancellationToken>,
    /// Abort the request after this long, including waits and retries
    pub timeout: Option<Duration>,
    /// Allow POST/PATCH retries for this request
    pub retry_writes: Option<bool>,
    /// Act on behalf of another user
    pub masquerade_as: Option<String>,
}

/// Request body payloads.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// JSON document
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` body
    Form(String),
    /// Raw bytes with an explicit content type
    Bytes {
        /// Payload
        data: Vec<u8>,
        /// Value of the `Content-Type` header
        content_type: String,
    },
}

/// A logical request: method, path, query, headers, body and options.
///
/// # Example
///
/// ```rust
/// use rest_resilience::client::ApiRequest;
///
/// let request = ApiRequest::get("/courses")
///     .query("per_page", "50")
///     .bucket("reporting")
///     .fail_fast();
/// assert_eq!(request.path, "/courses");
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// Extra request headers
    pub headers: HeaderMap,
    /// Optional body
    pub body: Option<RequestBody>,
    /// Pipeline options
    pub options: RequestOptions,
}

impl ApiRequest {
    /// Create a request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    /// GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, RestError> {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    /// Set a form-encoded body.
    pub fn form<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, RestError> {
        let encoded = serde_urlencoded::to_string(body)
            .map_err(|e| RestError::InvalidRequest(e.to_string()))?;
        self.body = Some(RequestBody::Form(encoded));
        Ok(self)
    }

    /// Set a raw body.
    pub fn bytes(mut self, data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Bytes {
            data: data.into(),
            content_type: content_type.into(),
        });
        self
    }

    /// Charge this request to an explicit quota bucket.
    pub fn bucket(mut self, name: impl Into<String>) -> Self {
        self.options.bucket = Some(name.into());
        self
    }

    /// Fail with a quota error instead of waiting when throttled.
    pub fn fail_fast(mut self) -> Self {
        self.options.wait_policy = Some(WaitPolicy::FailFast);
        self
    }

    /// Wait for the quota window to reset when throttled.
    pub fn wait_on_limit(mut self) -> Self {
        self.options.wait_policy = Some(WaitPolicy::Wait);
        self
    }

    /// Abort when `token` is cancelled.
    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.options.cancellation = Some(token);
        self
    }

    /// Abort after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Allow or forbid retrying this request when it is a write.
    pub fn retry_writes(mut self, allow: bool) -> Self {
        self.options.retry_writes = Some(allow);
        self
    }

    /// Act on behalf of another user.
    pub fn masquerade_as(mut self, user_id: impl Into<String>) -> Self {
        self.options.masquerade_as = Some(user_id.into());
        self
    }

    /// A GET for `url` carrying this request's headers and options.
    ///
    /// Used to follow cursor links, which already encode the query.
    pub fn follow(&self, url: &Url) -> Self {
        Self {
            method: Method::GET,
            path: url.to_string(),
            query: Vec::new(),
            headers: self.headers.clone(),
            body: None,
            options: self.options.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_options() {
        let token = CancellationToken::new();
        let request = ApiRequest::post("/courses")
            .query("a", "1")
            .query("b", "2")
            .bucket("shared")
            .fail_fast()
            .retry_writes(true)
            .masquerade_as("42")
            .cancel_with(token)
            .timeout(Duration::from_secs(5));

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.query, vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
        assert_eq!(request.options.bucket.as_deref(), Some("shared"));
        assert_eq!(request.options.wait_policy, Some(WaitPolicy::FailFast));
        assert_eq!(request.options.retry_writes, Some(true));
        assert_eq!(request.options.masquerade_as.as_deref(), Some("42"));
        assert!(request.options.cancellation.is_some());
        assert_eq!(request.options.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_form_body() {
        let request = ApiRequest::post("/x")
            .form(&[("name", "Intro to Rust"), ("code", "RS 101")])
            .unwrap();
        match request.body {
            Some(RequestBody::Form(body)) => assert_eq!(body, "name=Intro+to+Rust&code=RS+101"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_follow_keeps_headers_and_options_only() {
        let request = ApiRequest::post("/items")
            .query("per_page", "10")
            .header(
                HeaderName::from_static("x-tenant"),
                HeaderValue::from_static("t1"),
            )
            .bucket("b")
            .json(&serde_json::json!({"a": 1}))
            .unwrap();

        let url = Url::parse("https://api.example/items?page=2").unwrap();
        let next = request.follow(&url);

        assert_eq!(next.method, Method::GET);
        assert_eq!(next.path, "https://api.example/items?page=2");
        assert!(next.query.is_empty());
        assert!(next.body.is_none());
        assert_eq!(next.headers["x-tenant"], "t1");
        assert_eq!(next.options.bucket.as_deref(), Some("b"));
    }
}
