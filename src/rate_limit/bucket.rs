//! Quota bucket resolution.
//!
//! A bucket isolates quota state per (host, credential) pair so distinct
//! tenants or hosts never share a budget. The credential only ever enters
//! the key as a SHA-256 fingerprint.
//!
//! # Example
//!
//! ```rust
//! use rest_resilience::rate_limit::resolve_bucket;
//!
//! let a = resolve_bucket("api.example.com", Some("token-a"));
//! let b = resolve_bucket("api.example.com", Some("token-b"));
//! assert_ne!(a, b);
//! assert_eq!(a, resolve_bucket("api.example.com", Some("token-a")));
//! ```

use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::header::AUTHORIZATION;
use sha2::{Digest, Sha256};

/// Fingerprint used when a request carries no credential.
pub const ANONYMOUS: &str = "anonymous";

/// Identifies one quota scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey(String);

impl BucketKey {
    /// Use an explicit bucket name instead of a computed one.
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-way fingerprint of a credential.
///
/// Empty or absent credentials map to [`ANONYMOUS`]. Fingerprints are fixed
/// length URL-safe base64 and never contain `:`.
pub fn fingerprint(credential: Option<&str>) -> String {
    match credential {
        Some(credential) if !credential.is_empty() => {
            URL_SAFE_NO_PAD.encode(Sha256::digest(credential.as_bytes()))
        }
        _ => ANONYMOUS.to_string(),
    }
}

/// Compute the bucket key for a host and credential.
///
/// Pure and deterministic. Hosts are compared case-insensitively.
pub fn resolve_bucket(host: &str, credential: Option<&str>) -> BucketKey {
    BucketKey(format!(
        "{}:{}",
        host.to_ascii_lowercase(),
        fingerprint(credential)
    ))
}

/// Resolves bucket keys, honoring configured per-host overrides.
#[derive(Debug, Clone, Default)]
pub struct BucketResolver {
    /// Host to bucket name overrides
    overrides: HashMap<String, String>,
}

impl BucketResolver {
    /// Create a resolver with host overrides.
    pub fn new(overrides: HashMap<String, String>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(host, bucket)| (host.to_ascii_lowercase(), bucket))
            .collect();
        Self { overrides }
    }

    /// Resolve a key. An explicit bucket always wins, then a host override,
    /// then the computed host/credential key.
    pub fn resolve(&self, host: &str, credential: Option<&str>, explicit: Option<&str>) -> BucketKey {
        if let Some(name) = explicit {
            return BucketKey::named(name);
        }
        if let Some(name) = self.overrides.get(&host.to_ascii_lowercase()) {
            return BucketKey::named(name.clone());
        }
        resolve_bucket(host, credential)
    }

    /// Resolve the key for an outbound request.
    ///
    /// The host includes an explicit port. The credential is the bearer token
    /// from `Authorization`, or the `access_token` query parameter.
    pub fn resolve_request(&self, request: &reqwest::Request, explicit: Option<&str>) -> BucketKey {
        let url = request.url();
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        let header_credential = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(strip_scheme)
            .map(str::to_string);
        let credential = header_credential.or_else(|| {
            url.query_pairs()
                .find(|(name, _)| name == "access_token")
                .map(|(_, value)| value.into_owned())
        });

        self.resolve(&host, credential.as_deref(), explicit)
    }
}

fn strip_scheme(value: &str) -> &str {
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_pair_same_key() {
        for credential in [None, Some(""), Some("t1"), Some("a much longer token value")] {
            assert_eq!(
                resolve_bucket("api.example.com", credential),
                resolve_bucket("api.example.com", credential)
            );
        }
    }

    #[test]
    fn test_different_credentials_never_collide() {
        let tokens: Vec<String> = (0..200).map(|i| format!("token-{i}")).collect();
        let keys: std::collections::HashSet<_> = tokens
            .iter()
            .map(|t| resolve_bucket("api.example.com", Some(t)))
            .collect();
        assert_eq!(keys.len(), tokens.len());
    }

    #[test]
    fn test_different_hosts_never_collide() {
        let a = resolve_bucket("api.example.com", Some("t"));
        let b = resolve_bucket("files.example-cdn.com", Some("t"));
        let c = resolve_bucket("api.example.com:8443", Some("t"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_host_is_case_insensitive() {
        assert_eq!(
            resolve_bucket("API.Example.com", Some("t")),
            resolve_bucket("api.example.com", Some("t"))
        );
    }

    #[test]
    fn test_credential_not_in_key() {
        let key = resolve_bucket("api.example.com", Some("super_secret_token"));
        assert!(!key.as_str().contains("super_secret_token"));
        assert!(key.as_str().starts_with("api.example.com:"));
    }

    #[test]
    fn test_empty_credential_is_anonymous() {
        assert_eq!(
            resolve_bucket("h", Some("")).as_str(),
            format!("h:{ANONYMOUS}")
        );
        assert_eq!(resolve_bucket("h", None), resolve_bucket("h", Some("")));
    }

    #[test]
    fn test_explicit_override_wins() {
        let mut overrides = HashMap::new();
        overrides.insert("API.example.com".to_string(), "shared".to_string());
        let resolver = BucketResolver::new(overrides);

        assert_eq!(
            resolver.resolve("api.example.com", Some("t"), None),
            BucketKey::named("shared")
        );
        assert_eq!(
            resolver.resolve("api.example.com", Some("t"), Some("mine")),
            BucketKey::named("mine")
        );
        assert_eq!(
            resolver.resolve("other.example.com", Some("t"), None),
            resolve_bucket("other.example.com", Some("t"))
        );
    }

    #[test]
    fn test_resolve_request_reads_bearer_token() {
        let client = reqwest::Client::new();
        let request = client
            .get("https://api.example.com:8443/v1/users")
            .bearer_auth("abc")
            .build()
            .unwrap();

        let resolver = BucketResolver::default();
        assert_eq!(
            resolver.resolve_request(&request, None),
            resolve_bucket("api.example.com:8443", Some("abc"))
        );
    }

    #[test]
    fn test_resolve_request_reads_access_token_query() {
        let client = reqwest::Client::new();
        let request = client
            .get("https://api.example.com/v1/users?access_token=xyz")
            .build()
            .unwrap();

        let resolver = BucketResolver::default();
        assert_eq!(
            resolver.resolve_request(&request, None),
            resolve_bucket("api.example.com", Some("xyz"))
        );
    }
}
