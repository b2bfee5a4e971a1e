//! Credential handling for the request pipeline.
//!
//! This module provides:
//! - Bearer credentials with secure secret storage
//! - Providers that supply the current credential to the pipeline
//!
//! The pipeline only reads a credential to inject the `Authorization` header
//! and to fingerprint it for quota bucketing. It never persists or logs it.

mod credentials;

pub use credentials::{Credentials, CredentialsProvider, EnvCredentials, StaticCredentials};
