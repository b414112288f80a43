//! HTTP response handling.
//!
//! [`Response`] provides access to status, headers and the eagerly read body,
//! plus a back-reference to the [`Config`] that produced it.
//!
//! # Example
//!
//! ```ignore
//! let user: User = response.json()?;
//! ```

use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;

use crate::{Config, ErrorKind, Request};

/// HTTP response with status, headers and body.
///
/// Cloning is cheap: the body and the configuration are reference counted.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    data: Bytes,
    config: Option<Arc<Config>>,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, data: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            data: data.into(),
            config: None,
        }
    }

    /// Attach the configuration that produced this response.
    #[must_use]
    pub fn with_config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Single header value by name, when it is visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Response body.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Replace the body.
    pub fn set_data(&mut self, data: impl Into<Bytes>) {
        self.data = data.into();
    }

    /// Configuration of the request, once the pipeline attached it.
    #[must_use]
    pub fn config(&self) -> Option<&Config> {
        self.config.as_deref()
    }

    /// Wire request that was sent.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        self.config().and_then(|config| config.request.as_ref())
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 3xx.
    #[must_use]
    pub const fn is_redirection(&self) -> bool {
        self.status >= 300 && self.status < 400
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Deserialize the body as JSON.
    ///
    /// Uses the JSON codec of the producing configuration when it has one,
    /// `serde_json` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::JsonDeserialization`] if the body is not JSON or
    /// does not match `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        match self.config().and_then(|config| config.json_codec.as_ref()) {
            Some(codec) => {
                let value = codec
                    .unmarshal(&self.data)
                    .map_err(|err| ErrorKind::json_deserialization("", err.to_string()))?;
                crate::from_value(value)
            }
            None => crate::from_json(&self.data),
        }
    }

    /// Get the body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }
}
