//! REST client built on the middleware pipeline.

mod client;
mod request;
mod response;
mod traits;

pub use client::{RestClient, RestClientBuilder};
pub use request::{ApiRequest, RequestBody, RequestOptions};
pub use response::ApiResponse;
pub use traits::Execute;
