//! Wire request handed to the transport.
//!
//! The instance builds one [`Request`] per call from the merged
//! [`Config`](crate::Config); interceptors may still edit it before the
//! adapter sends it.
//!
//! # Example
//!
//! ```
//! use relay_core::{Method, Request};
//!
//! let request = Request::builder(Method::Get, "https://api.example.com/users".parse().expect("uri"))
//!     .header("accept", "application/json")
//!     .build();
//! assert_eq!(request.uri().path(), "/users");
//! ```

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Extensions, HeaderMap, Uri};

use crate::Method;

/// An HTTP request with method, URI, headers and optional body.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
    extensions: Extensions,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, uri: Uri) -> RequestBuilder {
        RequestBuilder::new(method, uri)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers.
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

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Typed per-request data shared with the transport.
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to the extensions.
    #[must_use]
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Consume into an [`http::Request`].
    #[must_use]
    pub fn into_http(self) -> http::Request<Bytes> {
        let mut request = http::Request::new(self.body.unwrap_or_default());
        *request.method_mut() = self.method.into();
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        *request.extensions_mut() = self.extensions;
        request
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            request: Request {
                method,
                uri,
                headers: HeaderMap::new(),
                body: None,
                extensions: Extensions::new(),
            },
        }
    }

    /// Appends a header; invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            self.request.headers.append(name, value);
        }
        self
    }

    /// Appends every header of the map.
    #[must_use]
    pub fn headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.request.headers.append(name, value.clone());
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: Bytes) -> Self {
        self.request.body = Some(body);
        self
    }

    /// Inserts a typed extension.
    #[must_use]
    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.request.extensions.insert(value);
        self
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().expect("valid URI")
    }

    #[test]
    fn request_builder_basic() {
        let request = Request::builder(Method::Get, uri("https://api.example.com/users"))
            .header("Accept", "application/json")
            .build();

        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.uri().to_string(), "https://api.example.com/users");
        assert_eq!(request.header("accept"), Some("application/json"));
        assert!(request.body().is_none());
    }

    #[test]
    fn request_builder_appends_headers() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));

        let request = Request::builder(Method::Get, uri("/"))
            .headers(&headers)
            .header("bad header", "ignored")
            .build();

        let tags: Vec<_> = request.headers().get_all("x-tag").iter().collect();
        assert_eq!(tags, ["a", "b"]);
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn request_into_http() {
        let body = Bytes::from(r#"{"name":"test"}"#);
        let request = Request::builder(Method::Post, uri("http://test.com/users"))
            .header("content-type", "application/json")
            .body(body.clone())
            .extension(42_u32)
            .build()
            .into_http();

        assert_eq!(request.method(), http::Method::POST);
        assert_eq!(request.body(), &body);
        assert_eq!(request.extensions().get::<u32>(), Some(&42));
    }
}
