//! Bearer credential management.

use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::error::RestError;

/// A bearer token.
#[derive(Clone)]
pub struct Credentials {
    token: SecretString,
}

impl Credentials {
    /// Create new credentials from a bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }

    /// Get the raw token.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_secret(&self) -> &str {
        self.token.expose_secret()
    }

    /// Build the `Authorization` header value, marked sensitive.
    pub fn authorization_header(&self) -> Result<HeaderValue, RestError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.expose_secret()))
            .map_err(|_| {
                RestError::InvalidRequest("Token contains invalid header characters".to_string())
            })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Trait for providing API credentials.
///
/// Implement this trait to customize how credentials are retrieved,
/// for example from a secrets manager or a token refresher. It is called
/// once per request, so a rotated token takes effect on the next send.
pub trait CredentialsProvider: Send + Sync {
    /// Get the current credentials.
    fn get_credentials(&self) -> Credentials;
}

/// Static credentials provider that holds credentials directly.
#[derive(Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Create a new static credentials provider.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(token),
        }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn get_credentials(&self) -> Credentials {
        self.credentials.clone()
    }
}

/// Credentials provider that reads the token from an environment variable.
pub struct EnvCredentials {
    credentials: Credentials,
}

impl EnvCredentials {
    /// Read the token from a custom environment variable.
    ///
    /// Returns `None` if the variable is not set or empty.
    pub fn try_from_env_var(token_var: &str) -> Option<Self> {
        let token = std::env::var(token_var).ok().filter(|t| !t.is_empty())?;

        Some(Self {
            credentials: Credentials::new(token),
        })
    }
}

impl CredentialsProvider for EnvCredentials {
    fn get_credentials(&self) -> Credentials {
        self.credentials.clone()
    }
}
