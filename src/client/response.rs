//! Responses returned by the executor.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::{ApiError, RestError};
use crate::retry::parse_retry_after;

/// A fully read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: Vec<u8>,
    attempts: u32,
}

impl ApiResponse {
    /// Create a response directly (useful for mock executors).
    pub fn new(status: StatusCode, headers: HeaderMap, url: Url, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            url,
            body: body.into(),
            attempts: 1,
        }
    }

    /// Read a transport response to the end.
    pub(crate) async fn read(response: reqwest::Response, attempts: u32) -> Result<Self, RestError> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();

        Ok(Self {
            status,
            headers,
            url,
            body,
            attempts,
        })
    }

    /// Set the attempt count.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final URL of the response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Attempts made to obtain this response.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, RestError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            RestError::InvalidResponse(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                self.text()
            ))
        })
    }

    /// Turn non-success statuses into their error kind.
    pub fn error_for_status(self) -> Result<Self, RestError> {
        let status = self.status;
        if !(status.is_client_error() || status.is_server_error()) {
            return Ok(self);
        }

        let retry_after = parse_retry_after(&self.headers);
        let error = ApiError::new(status, self.text(), self.attempts);

        Err(if status == StatusCode::TOO_MANY_REQUESTS {
            RestError::TooManyRequests { error, retry_after }
        } else if status.is_server_error() {
            RestError::Server(error)
        } else {
            RestError::Client(error)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, RETRY_AFTER};
    use std::time::Duration;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            Url::parse("https://api.example/x").unwrap(),
            body,
        )
    }

    #[test]
    fn test_success_passes() {
        let ok = response(200, "[]").error_for_status().unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert!(response(304, "").error_for_status().is_ok());
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            response(404, "nope").error_for_status(),
            Err(RestError::Client(e)) if e.body == "nope"
        ));
        assert!(matches!(
            response(502, "").with_attempts(3).error_for_status(),
            Err(RestError::Server(e)) if e.attempts == 3
        ));

        let mut limited = response(429, "");
        limited
            .headers
            .insert(RETRY_AFTER, HeaderValue::from_static("7"));
        match limited.error_for_status() {
            Err(RestError::TooManyRequests { retry_after, .. }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_json_error_includes_body() {
        let err = response(200, "not json").json::<Vec<u32>>().unwrap_err();
        assert!(err.to_string().contains("not json"));
    }
}
