//! Transport and adapter traits.
//!
//! - [`HttpClient`] - low-level HTTP execution of a wire [`Request`]
//! - [`Adapter`] - turns a prepared [`Config`] into a [`Response`]
//!
//! The default adapter sends `config.request` through an [`HttpClient`].
//! Implement [`Adapter`] directly (or pass a closure) to mock the network.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::{Config, Request, Response, Result};

/// Core HTTP client trait.
///
/// Implementations read the whole body before resolving and should record
/// timings into the [`HttpTrace`](crate::HttpTrace) found in the request
/// extensions, when present.
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Invalid response
    fn execute(&self, request: Request) -> BoxFuture<'static, Result<Response>>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn execute(&self, request: Request) -> BoxFuture<'static, Result<Response>> {
        (**self).execute(request)
    }
}

/// Performs the exchange for a fully prepared [`Config`].
///
/// Adapters see the wire request in `config.request` and may read any other
/// field (route, side-channel data). Synchronous closures implement this
/// trait directly:
///
/// ```
/// use relay_core::{Adapter, Config, Response, Result};
/// use http::HeaderMap;
///
/// fn assert_adapter(_: impl Adapter) {}
///
/// assert_adapter(|_config: &mut Config| -> Result<Response> {
///     Ok(Response::new(200, HeaderMap::new(), "ok"))
/// });
/// ```
pub trait Adapter: Send + Sync {
    /// Produce the response for the request.
    ///
    /// # Errors
    ///
    /// Returns an error if no response can be produced.
    fn call<'a>(&'a self, config: &'a mut Config) -> BoxFuture<'a, Result<Response>>;
}

impl<F> Adapter for F
where
    F: Fn(&mut Config) -> Result<Response> + Send + Sync,
{
    fn call<'a>(&'a self, config: &'a mut Config) -> BoxFuture<'a, Result<Response>> {
        let result = self(config);
        Box::pin(std::future::ready(result))
    }
}
