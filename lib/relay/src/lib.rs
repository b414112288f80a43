//! Configurable HTTP request library for Rust.
//!
//! Requests go through a pipeline of request transforms, interceptors, an
//! adapter and response transforms, with hooks on failure and completion.
//! An [`Instance`] carries the defaults shared by its requests and can cap
//! how many of them run at once.
//!
//! # Example
//!
//! ```no_run
//! use relay::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! pub struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # async fn run() -> relay::Result<()> {
//! let instance = Instance::new(
//!     InstanceConfig::new().with_base_url("https://api.example.com"),
//! );
//! let config = Config::new(Method::Get, "/users/:id").param("id", "42");
//! let user: User = instance.request_as(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The free functions ([`get`], [`post`], ...) use a shared
//! [`default_instance`] with a 60 second timeout.

mod adapter;
mod client;
mod config;
mod connector;
mod instance;
pub mod middleware;
pub mod prelude;
mod transform;

use std::sync::OnceLock;
use std::time::Duration;

// Re-export transport types
pub use adapter::{DefaultAdapter, default_client};
pub use client::{BoxedService, HyperClient, HyperClientBuilder, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder};

// Re-export the pipeline
pub use instance::{DEFAULT_ACCEPT_ENCODING, DEFAULT_USER_AGENT, Instance, MockGuard};
pub use transform::{
    BrotliDecoder, ConvertRequestBody, GzipDecoder, default_transform_request,
    default_transform_response,
};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use relay_core::{
    Adapter, Body, BoxError, CancellationToken, Config, ContentType, Context, DropGuard, Error,
    ErrorCategory, ErrorKind, Form, HttpClient, HttpTrace, InstanceConfig, JsonCodec, Method,
    OnBeforeNewRequest, OnDone, OnError, Part, Request, RequestBuilder, RequestInterceptor,
    RequestResult, Response, ResponseInterceptor, Result, SerdeJson, Stats, Timeline, TracePhase,
    TransformRequest, TransformResponse, Values, category, ceil_to_ms, from_json, from_value,
    route_of, substitute_params, url_join,
};

// Re-export http types for status codes and headers
pub use relay_core::{HeaderMap, StatusCode, header};

/// Timeout of the shared default instance.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared instance behind the free functions.
pub fn default_instance() -> &'static Instance {
    static INSTANCE: OnceLock<Instance> = OnceLock::new();
    INSTANCE.get_or_init(|| Instance::new(InstanceConfig::new().with_timeout(DEFAULT_TIMEOUT)))
}

/// Run a request on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn request(config: Config) -> Result<Response> {
    default_instance().request(config).await
}

/// GET on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn get(url: &str, query: Option<Values>) -> Result<Response> {
    default_instance().get(url, query).await
}

/// DELETE on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn delete(url: &str, query: Option<Values>) -> Result<Response> {
    default_instance().delete(url, query).await
}

/// HEAD on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn head(url: &str, query: Option<Values>) -> Result<Response> {
    default_instance().head(url, query).await
}

/// OPTIONS on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn options(url: &str, query: Option<Values>) -> Result<Response> {
    default_instance().options(url, query).await
}

/// POST on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn post(url: &str, body: impl Into<Body>, query: Option<Values>) -> Result<Response> {
    default_instance().post(url, body, query).await
}

/// PUT on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn put(url: &str, body: impl Into<Body>, query: Option<Values>) -> Result<Response> {
    default_instance().put(url, body, query).await
}

/// PATCH on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn patch(url: &str, body: impl Into<Body>, query: Option<Values>) -> Result<Response> {
    default_instance().patch(url, body, query).await
}

/// Multipart upload on the default instance.
///
/// # Errors
///
/// See [`Instance::request`].
pub async fn upload(url: &str, form: Form, query: Option<Values>) -> Result<Response> {
    default_instance().upload(url, form, query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_instance_is_shared() {
        let instance = default_instance();
        assert!(std::ptr::eq(instance, default_instance()));
        assert_eq!(instance.config().timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(instance.concurrency(), 0);
    }
}
