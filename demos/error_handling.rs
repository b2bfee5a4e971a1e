//! Example: Working with RestError and ApiError.
//!
//! Run with: cargo run --example error_handling

use std::time::Duration;

use reqwest::StatusCode;
use rest_resilience::rate_limit::BucketKey;
use rest_resilience::{ApiError, RestError};

fn describe(err: &RestError) {
    match err {
        RestError::QuotaExceeded {
            bucket,
            retry_after,
        } => println!("Bucket {} throttled, retry in {:?}", bucket, retry_after),
        RestError::TooManyRequests { retry_after, .. } => {
            println!("Server throttled us, retry in {:?}", retry_after)
        }
        RestError::Client(api) if api.is_unauthorized() => println!("Token rejected"),
        other => println!("{}", other),
    }
    println!(
        "  retryable: {}, cancellation: {}, attempts: {:?}",
        err.is_retryable(),
        err.is_cancellation(),
        err.attempts()
    );
}

fn main() {
    let api_error = ApiError::new(StatusCode::UNAUTHORIZED, "{\"errors\":[]}", 1);
    println!("API error: {}", api_error);

    describe(&RestError::Client(api_error));
    describe(&RestError::Server(ApiError::new(
        StatusCode::SERVICE_UNAVAILABLE,
        "maintenance",
        3,
    )));
    describe(&RestError::TooManyRequests {
        error: ApiError::new(StatusCode::TOO_MANY_REQUESTS, "", 3),
        retry_after: Some(Duration::from_secs(5)),
    });
    describe(&RestError::QuotaExceeded {
        bucket: BucketKey::named("reporting"),
        retry_after: Some(Duration::from_millis(1500)),
    });
    describe(&RestError::Cancelled);
}
