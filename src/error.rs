//! Error types for the request pipeline.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::rate_limit::BucketKey;

/// The main error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum RestError {
    /// Building the request or reading the response body failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A middleware outside this crate aborted the chain
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// Connection-level failure (DNS, TCP, TLS) that survived every retry
    #[error("Transport error after {attempts} attempt(s): {source}")]
    Transport {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The last underlying error
        #[source]
        source: reqwest::Error,
    },

    /// The client-side quota for a bucket is exhausted and fail-fast was selected
    #[error("Quota exceeded for bucket {bucket}, retry after {retry_after:?}")]
    QuotaExceeded {
        /// The bucket that ran out of budget
        bucket: BucketKey,
        /// Time until the bucket's window refreshes, if known
        retry_after: Option<Duration>,
    },

    /// The server answered 429 on the final attempt
    #[error("Too many requests: {error}")]
    TooManyRequests {
        /// Status, body and attempt count of the final response
        error: ApiError,
        /// Server-provided retry hint
        retry_after: Option<Duration>,
    },

    /// The server answered 5xx on the final attempt
    #[error("Server error: {0}")]
    Server(ApiError),

    /// The server answered 4xx (other than 429)
    #[error("Client error: {0}")]
    Client(ApiError),

    /// The caller's cancellation token fired
    #[error("Request cancelled")]
    Cancelled,

    /// The caller's deadline elapsed
    #[error("Request timed out")]
    Timeout,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// The request could not be assembled
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RestError {
    /// Whether the pipeline would have retried this failure had attempts remained.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::TooManyRequests { .. } | Self::Server(_)
        )
    }

    /// Whether the request was abandoned by the caller (token or deadline).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout)
    }

    /// Number of attempts made, for errors raised after the request was sent.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Transport { attempts, .. } => Some(*attempts),
            Self::TooManyRequests { error, .. } | Self::Server(error) | Self::Client(error) => {
                Some(error.attempts)
            }
            _ => None,
        }
    }

    /// HTTP status of the final response, when the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::TooManyRequests { error, .. } | Self::Server(error) | Self::Client(error) => {
                Some(error.status)
            }
            _ => None,
        }
    }
}

/// A terminal non-success response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status of the response
    pub status: StatusCode,
    /// Response body, decoded lossily as UTF-8
    pub body: String,
    /// Attempts made before this response was accepted as final
    pub attempts: u32,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {} after {} attempt(s)", self.status, self.attempts)?;
        if !self.body.is_empty() {
            write!(f, ": {}", self.body)?;
        }
        Ok(())
    }
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, body: impl Into<String>, attempts: u32) -> Self {
        Self {
            status,
            body: body.into(),
            attempts,
        }
    }

    /// Try to decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(&self.body).ok()
    }

    /// Check if this is a 401/403 response.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        )
    }

    /// Check if this is a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let error = ApiError::new(StatusCode::NOT_FOUND, "missing", 1);
        assert_eq!(error.to_string(), "HTTP 404 Not Found after 1 attempt(s): missing");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_api_error_json_body() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, r#"{"errors":["bad"]}"#, 1);
        let body: serde_json::Value = error.json().unwrap();
        assert_eq!(body["errors"][0], "bad");
    }

    #[test]
    fn test_classification_helpers() {
        let server = RestError::Server(ApiError::new(StatusCode::BAD_GATEWAY, "", 3));
        assert!(server.is_retryable());
        assert_eq!(server.attempts(), Some(3));
        assert_eq!(server.status(), Some(StatusCode::BAD_GATEWAY));

        let client = RestError::Client(ApiError::new(StatusCode::BAD_REQUEST, "", 1));
        assert!(!client.is_retryable());

        assert!(RestError::Cancelled.is_cancellation());
        assert!(RestError::Timeout.is_cancellation());
        assert!(!client.is_cancellation());
    }
}
