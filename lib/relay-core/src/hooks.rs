//! Lifecycle hooks: body transforms, interceptors and completion callbacks.
//!
//! Every hook is a single-method trait with a blanket implementation for
//! closures of the matching shape, so both of these work:
//!
//! ```
//! use std::sync::Arc;
//! use relay_core::{BoxError, Config, RequestInterceptor};
//!
//! struct Tag;
//!
//! impl RequestInterceptor for Tag {
//!     fn intercept(&self, config: &mut Config) -> Result<(), BoxError> {
//!         config.set("tag", "a");
//!         Ok(())
//!     }
//! }
//!
//! let by_struct: Arc<dyn RequestInterceptor> = Arc::new(Tag);
//! let by_closure: Arc<dyn RequestInterceptor> = Arc::new(|config: &mut Config| -> Result<(), BoxError> {
//!     config.set("tag", "b");
//!     Ok(())
//! });
//! ```

use bytes::Bytes;
use http::HeaderMap;

use crate::{Body, BoxError, Config, Error, Response};

/// Transforms the request body before it is sent.
///
/// Runs only for methods that carry a body (POST, PUT, PATCH).
pub trait TransformRequest: Send + Sync {
    /// Produce the next body; headers may be edited (e.g. Content-Type).
    ///
    /// # Errors
    ///
    /// Returns an error to abort the request.
    fn transform(&self, body: Body, headers: &mut HeaderMap) -> Result<Body, BoxError>;
}

impl<F> TransformRequest for F
where
    F: Fn(Body, &mut HeaderMap) -> Result<Body, BoxError> + Send + Sync,
{
    fn transform(&self, body: Body, headers: &mut HeaderMap) -> Result<Body, BoxError> {
        self(body, headers)
    }
}

/// Transforms the response body once it has been read.
pub trait TransformResponse: Send + Sync {
    /// Produce the next body; headers may be edited (e.g. Content-Encoding).
    ///
    /// # Errors
    ///
    /// Returns an error to fail the request.
    fn transform(&self, data: Bytes, headers: &mut HeaderMap) -> Result<Bytes, BoxError>;
}

impl<F> TransformResponse for F
where
    F: Fn(Bytes, &mut HeaderMap) -> Result<Bytes, BoxError> + Send + Sync,
{
    fn transform(&self, data: Bytes, headers: &mut HeaderMap) -> Result<Bytes, BoxError> {
        self(data, headers)
    }
}

/// Runs after the wire request is built, before the adapter.
pub trait RequestInterceptor: Send + Sync {
    /// Inspect or edit the configuration and its wire request.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the request.
    fn intercept(&self, config: &mut Config) -> Result<(), BoxError>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut Config) -> Result<(), BoxError> + Send + Sync,
{
    fn intercept(&self, config: &mut Config) -> Result<(), BoxError> {
        self(config)
    }
}

/// Runs after the response transforms.
pub trait ResponseInterceptor: Send + Sync {
    /// Inspect or edit the response.
    ///
    /// # Errors
    ///
    /// Returns an error to fail the request.
    fn intercept(&self, response: &mut Response) -> Result<(), BoxError>;
}

impl<F> ResponseInterceptor for F
where
    F: Fn(&mut Response) -> Result<(), BoxError> + Send + Sync,
{
    fn intercept(&self, response: &mut Response) -> Result<(), BoxError> {
        self(response)
    }
}

/// Called with every failed request; may replace the error.
pub trait OnError: Send + Sync {
    /// Return `Some` to replace the error, `None` to keep it.
    fn on_error(&self, error: &Error) -> Option<BoxError>;
}

impl<F> OnError for F
where
    F: Fn(&Error) -> Option<BoxError> + Send + Sync,
{
    fn on_error(&self, error: &Error) -> Option<BoxError> {
        self(error)
    }
}

/// Called once per request, whatever the outcome.
pub trait OnDone: Send + Sync {
    /// Observe the final outcome.
    fn on_done(&self, config: &Config, response: Option<&Response>, error: Option<&Error>);
}

impl<F> OnDone for F
where
    F: Fn(&Config, Option<&Response>, Option<&Error>) + Send + Sync,
{
    fn on_done(&self, config: &Config, response: Option<&Response>, error: Option<&Error>) {
        self(config, response, error);
    }
}

/// Called right after the defaults are merged, before the wire request is built.
pub trait OnBeforeNewRequest: Send + Sync {
    /// Inspect or edit the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the request.
    fn before_new_request(&self, config: &mut Config) -> Result<(), BoxError>;
}

impl<F> OnBeforeNewRequest for F
where
    F: Fn(&mut Config) -> Result<(), BoxError> + Send + Sync,
{
    fn before_new_request(&self, config: &mut Config) -> Result<(), BoxError> {
        self(config)
    }
}
