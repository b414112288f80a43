//! Request and instance configuration.
//!
//! A [`Config`] describes one call. Before the call runs, the owning
//! instance fills every unset field from its [`InstanceConfig`] with
//! [`Config::merge`]; a field set on the call always wins.
//!
//! # Example
//!
//! ```
//! use relay_core::{Config, Method, Values};
//!
//! let mut query = Values::new();
//! query.add("a", "1");
//!
//! let config = Config::new(Method::Get, "/users/:type")
//!     .base_url("http://test.com")
//!     .param("type", "vip")
//!     .query(query);
//! assert_eq!(config.get_url(), "http://test.com/users/vip?a=1");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

use crate::{
    Adapter, Body, Context, Error, ErrorKind, HttpClient, HttpTrace, JsonCodec, Method,
    OnBeforeNewRequest, OnDone, OnError, Request, RequestInterceptor, ResponseInterceptor, Result,
    SerdeJson, TransformRequest, TransformResponse, Values,
};

type Data = HashMap<String, Box<dyn Any + Send + Sync>>;

// ============================================================================
// URL building
// ============================================================================

/// Join a base URL and a request URL.
///
/// An absolute `url` (`http://` or `https://`) or an empty base is returned
/// unchanged; otherwise the two are concatenated, dropping one slash when
/// both sides carry it.
#[must_use]
pub fn url_join(base: &str, url: &str) -> String {
    if base.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match (base.strip_suffix('/'), url.starts_with('/')) {
        (Some(trimmed), true) => format!("{trimmed}{url}"),
        _ => format!("{base}{url}"),
    }
}

/// Path component of a URL: scheme, authority, query and fragment stripped.
#[must_use]
pub fn route_of(url: &str) -> &str {
    let path = match url.find("://") {
        Some(idx) => {
            let rest = url.get(idx + 3..).unwrap_or_default();
            rest.find('/').and_then(|slash| rest.get(slash..)).unwrap_or_default()
        }
        None => url,
    };
    path.split(['?', '#']).next().unwrap_or_default()
}

/// Replace every `:name` token whose name is a key of `params`.
///
/// A name is the longest run of ASCII alphanumerics and underscores after
/// the colon; tokens without a matching key are kept as written.
#[must_use]
pub fn substitute_params(url: &str, params: &HashMap<String, String>) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let mut out = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(idx) = rest.find(':') {
        let (head, tail) = rest.split_at(idx);
        out.push_str(head);
        let name_len = tail
            .get(1..)
            .unwrap_or_default()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(tail.len() - 1);
        let name = tail.get(1..=name_len).unwrap_or_default();
        match params.get(name) {
            Some(value) if !name.is_empty() => out.push_str(value),
            _ => out.push_str(tail.get(..=name_len).unwrap_or(tail)),
        }
        rest = tail.get(name_len + 1..).unwrap_or_default();
    }
    out.push_str(rest);
    out
}

fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

// ============================================================================
// Config
// ============================================================================

/// Configuration of a single request.
///
/// Fields are public: build with the chainable setters or assign directly.
/// `route`, `request`, `concurrency` and `trace` are outputs filled by the
/// instance while the request runs.
#[derive(Default)]
pub struct Config {
    /// HTTP method, GET when unset.
    pub method: Option<Method>,
    /// Request URL, absolute or relative to `base_url`.
    pub url: String,
    /// Base URL prepended to relative URLs.
    pub base_url: Option<String>,
    /// Path template captured before parameter substitution.
    pub route: String,
    /// Values for `:name` placeholders.
    pub params: HashMap<String, String>,
    /// Query string values.
    pub query: Option<Values>,
    /// Extra request headers.
    pub headers: HeaderMap,
    /// Request payload, only sent for POST, PUT and PATCH.
    pub body: Option<Body>,
    /// Request body transforms, `None` inherits the instance ones.
    pub transform_request: Option<Vec<Arc<dyn TransformRequest>>>,
    /// Response body transforms, `None` inherits the instance ones.
    pub transform_response: Option<Vec<Arc<dyn TransformResponse>>>,
    /// Deadline for the whole exchange.
    pub timeout: Option<Duration>,
    /// Cancellation context.
    pub context: Option<Context>,
    /// Transport used by the default adapter.
    pub client: Option<Arc<dyn HttpClient>>,
    /// Adapter performing the exchange.
    pub adapter: Option<Arc<dyn Adapter>>,
    /// Interceptors run before the adapter, `None` inherits the instance ones.
    pub request_interceptors: Option<Vec<Arc<dyn RequestInterceptor>>>,
    /// Interceptors run after the response transforms, `None` inherits the instance ones.
    pub response_interceptors: Option<Vec<Arc<dyn ResponseInterceptor>>>,
    /// Error hook.
    pub on_error: Option<Arc<dyn OnError>>,
    /// Completion hook.
    pub on_done: Option<Arc<dyn OnDone>>,
    /// Hook run before the wire request is built.
    pub on_before_new_request: Option<Arc<dyn OnBeforeNewRequest>>,
    /// JSON codec for the built-in transforms and [`Response::json`](crate::Response::json).
    pub json_codec: Option<Arc<dyn JsonCodec>>,
    /// Collect timings, set from the instance.
    pub enable_trace: bool,
    /// Wire request, once built.
    pub request: Option<Request>,
    /// In-flight requests of the instance when this one was admitted.
    pub concurrency: u32,
    /// Timing collector, when tracing is enabled.
    pub trace: Option<Arc<HttpTrace>>,
    data: Option<Data>,
}

impl Config {
    /// Create a configuration for `method` and `url`.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set a route parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_param(key, value);
        self
    }

    /// Set the query.
    #[must_use]
    pub fn query(mut self, query: Values) -> Self {
        self.query = Some(query);
        self
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Append a header from strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or the value is not a valid header.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::try_from(name)
            .map_err(|err| ErrorKind::InvalidHeader(format!("{name}: {err}")))?;
        let value = HeaderValue::try_from(value)
            .map_err(|err| ErrorKind::InvalidHeader(format!("{name}: {err}")))?;
        Ok(self.header(name, value))
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a structured body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn json<T: serde::Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        Ok(self.body(Body::json(value)?))
    }

    /// Set the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the cancellation context.
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Set the transport.
    #[must_use]
    pub fn client(mut self, client: impl HttpClient + 'static) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Set the adapter.
    #[must_use]
    pub fn adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    /// Set the error hook.
    #[must_use]
    pub fn on_error(mut self, hook: impl OnError + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Set the completion hook.
    #[must_use]
    pub fn on_done(mut self, hook: impl OnDone + 'static) -> Self {
        self.on_done = Some(Arc::new(hook));
        self
    }

    /// Set the hook run before the wire request is built.
    #[must_use]
    pub fn on_before_new_request(mut self, hook: impl OnBeforeNewRequest + 'static) -> Self {
        self.on_before_new_request = Some(Arc::new(hook));
        self
    }

    /// Set the JSON codec.
    #[must_use]
    pub fn json_codec(mut self, codec: impl JsonCodec + 'static) -> Self {
        self.json_codec = Some(Arc::new(codec));
        self
    }

    /// Add a query value.
    pub fn add_query(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.get_or_insert_with(Values::new).add(key, value);
        self
    }

    /// Add every entry of a map to the query.
    pub fn add_query_map<K, V>(&mut self, map: &HashMap<K, V>) -> &mut Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.query
            .get_or_insert_with(Values::new)
            .extend_from(&Values::from_map(map));
        self
    }

    /// Add the fields of a serializable struct to the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a flat struct.
    pub fn add_query_struct<T: serde::Serialize>(&mut self, value: &T) -> Result<&mut Self> {
        let values = Values::from_serialize(value)?;
        self.query.get_or_insert_with(Values::new).extend_from(&values);
        Ok(self)
    }

    /// Set a route parameter.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Append a request interceptor.
    ///
    /// Once the call has its own list, the instance interceptors are no
    /// longer inherited.
    pub fn add_request_interceptor(&mut self, interceptor: impl RequestInterceptor + 'static) {
        self.request_interceptors
            .get_or_insert_with(Vec::new)
            .push(Arc::new(interceptor));
    }

    /// Insert a request interceptor first.
    pub fn prepend_request_interceptor(&mut self, interceptor: impl RequestInterceptor + 'static) {
        self.request_interceptors
            .get_or_insert_with(Vec::new)
            .insert(0, Arc::new(interceptor));
    }

    /// Append a response interceptor.
    pub fn add_response_interceptor(&mut self, interceptor: impl ResponseInterceptor + 'static) {
        self.response_interceptors
            .get_or_insert_with(Vec::new)
            .push(Arc::new(interceptor));
    }

    /// Insert a response interceptor first.
    pub fn prepend_response_interceptor(
        &mut self,
        interceptor: impl ResponseInterceptor + 'static,
    ) {
        self.response_interceptors
            .get_or_insert_with(Vec::new)
            .insert(0, Arc::new(interceptor));
    }

    /// Store a value in the side channel.
    pub fn set(&mut self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.data
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Box::new(value));
    }

    /// Read a side-channel value of type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.as_ref()?.get(key)?.downcast_ref()
    }

    /// Read a side-channel string (`String` or `&'static str`).
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get::<String>(key)
            .map(String::as_str)
            .or_else(|| self.get::<&'static str>(key).copied())
    }

    /// Read a side-channel boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get::<bool>(key).copied()
    }

    /// Read a side-channel integer (`i64`, `i32` or `isize`).
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get::<i64>(key)
            .copied()
            .or_else(|| self.get::<i32>(key).map(|value| i64::from(*value)))
            .or_else(|| self.get::<isize>(key).and_then(|value| i64::try_from(*value).ok()))
    }

    /// Fill every unset field from the instance defaults.
    ///
    /// Headers are merged additively; `enable_trace` always follows the
    /// instance.
    pub fn merge(&mut self, instance: &InstanceConfig) {
        self.enable_trace = instance.enable_trace;
        if self.base_url.is_none() {
            self.base_url.clone_from(&instance.base_url);
        }
        if self.transform_request.is_none() {
            self.transform_request.clone_from(&instance.transform_request);
        }
        if self.transform_response.is_none() {
            self.transform_response.clone_from(&instance.transform_response);
        }
        for (name, value) in &instance.headers {
            self.headers.append(name, value.clone());
        }
        if self.timeout.is_none() {
            self.timeout = instance.timeout;
        }
        if self.client.is_none() {
            self.client.clone_from(&instance.client);
        }
        if self.adapter.is_none() {
            self.adapter.clone_from(&instance.adapter);
        }
        if self.request_interceptors.is_none() {
            self.request_interceptors = Some(instance.request_interceptors.clone());
        }
        if self.response_interceptors.is_none() {
            self.response_interceptors = Some(instance.response_interceptors.clone());
        }
        if self.on_error.is_none() {
            self.on_error.clone_from(&instance.on_error);
        }
        if self.on_done.is_none() {
            self.on_done.clone_from(&instance.on_done);
        }
        if self.on_before_new_request.is_none() {
            self.on_before_new_request
                .clone_from(&instance.on_before_new_request);
        }
        if self.json_codec.is_none() {
            self.json_codec = Some(Arc::clone(&instance.json_codec));
        }
    }

    /// Base URL joined with the URL, before parameter substitution.
    #[must_use]
    pub fn joined_url(&self) -> String {
        url_join(self.base_url.as_deref().unwrap_or_default(), &self.url)
    }

    /// Final URL: joined, parameters substituted, query appended.
    #[must_use]
    pub fn get_url(&self) -> String {
        let mut url = substitute_params(&self.joined_url(), &self.params);
        if let Some(query) = self.query.as_ref().filter(|query| !query.is_empty()) {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query.encode());
        }
        url
    }

    /// Run the request transforms and encode the body.
    ///
    /// Only POST, PUT and PATCH carry a body. The encoded bytes are stored
    /// back into `body` so the call can be repeated; when a transform fails
    /// the original body is put back, unless it was a reader. A
    /// [`Body::Reader`] is drained with a blocking read.
    ///
    /// # Errors
    ///
    /// Returns the first transform error, or
    /// [`ErrorKind::RequestDataTypeInvalid`] if the transformed body is
    /// neither bytes nor a reader.
    pub fn build_body(&mut self) -> Result<Option<Bytes>> {
        if !self.method.unwrap_or_default().has_body() {
            return Ok(None);
        }
        let Some(mut body) = self.body.take() else {
            return Ok(None);
        };
        let original = body.try_clone();
        for transform in self.transform_request.iter().flatten() {
            body = match transform.transform(body, &mut self.headers) {
                Ok(body) => body,
                Err(err) => {
                    self.body = original;
                    return Err(Error::other(err));
                }
            };
        }

        let bytes = match body {
            Body::Bytes(bytes) => bytes,
            Body::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).map_err(ErrorKind::Io)?;
                Bytes::from(buf)
            }
            other => {
                self.body = Some(other);
                return Err(ErrorKind::RequestDataTypeInvalid.into());
            }
        };
        self.body = Some(Body::Bytes(bytes.clone()));
        Ok(Some(bytes))
    }

    /// Render the request as a cURL command, running the request transforms first.
    ///
    /// A body that fails to encode is left out.
    pub fn curl(&mut self) -> String {
        let body = self.build_body().ok().flatten();
        self.render_curl(body.as_ref())
    }

    /// Render the request as a cURL command without running any transform.
    ///
    /// Matches [`Config::curl`] once the request went through an instance,
    /// which stores the encoded body back.
    #[must_use]
    pub fn as_curl(&self) -> String {
        let body = if self.method.unwrap_or_default().has_body() {
            self.body.as_ref().and_then(Body::as_bytes)
        } else {
            None
        };
        self.render_curl(body)
    }

    fn render_curl(&self, body: Option<&Bytes>) -> String {
        let mut out = format!("curl -X{} ", self.method.unwrap_or_default());
        if let Some(body) = body {
            let _ = write!(out, "-d '{}' ", String::from_utf8_lossy(body));
        }
        for (name, value) in &self.headers {
            let _ = write!(
                out,
                "-H '{}:{}' ",
                canonical_header_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes())
            );
        }
        let _ = write!(out, "'{}'", self.get_url());
        out
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("base_url", &self.base_url)
            .field("route", &self.route)
            .field("params", &self.params)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("enable_trace", &self.enable_trace)
            .field("request", &self.request)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// InstanceConfig
// ============================================================================

/// Defaults shared by every request of an instance.
#[derive(Clone)]
pub struct InstanceConfig {
    /// Base URL prepended to relative URLs.
    pub base_url: Option<String>,
    /// Request body transforms, `None` uses the built-in pipeline.
    pub transform_request: Option<Vec<Arc<dyn TransformRequest>>>,
    /// Response body transforms, `None` uses the built-in pipeline.
    pub transform_response: Option<Vec<Arc<dyn TransformResponse>>>,
    /// Headers appended to every request.
    pub headers: HeaderMap,
    /// Default timeout.
    pub timeout: Option<Duration>,
    /// Default transport.
    pub client: Option<Arc<dyn HttpClient>>,
    /// Default adapter.
    pub adapter: Option<Arc<dyn Adapter>>,
    /// Request interceptors, run in order.
    pub request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    /// Response interceptors, run in order.
    pub response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    /// Error hook.
    pub on_error: Option<Arc<dyn OnError>>,
    /// Completion hook.
    pub on_done: Option<Arc<dyn OnDone>>,
    /// Hook run before the wire request is built.
    pub on_before_new_request: Option<Arc<dyn OnBeforeNewRequest>>,
    /// Collect timings for every request.
    pub enable_trace: bool,
    /// Negative disables all requests, zero is unlimited, positive caps in-flight requests.
    pub max_concurrency: i32,
    /// JSON codec used by the built-in transforms and typed decoding.
    pub json_codec: Arc<dyn JsonCodec>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            transform_request: None,
            transform_response: None,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
            adapter: None,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            on_error: None,
            on_done: None,
            on_before_new_request: None,
            enable_trace: false,
            max_concurrency: 0,
            json_codec: Arc::new(SerdeJson),
        }
    }
}

impl InstanceConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the default timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append a default header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set the transport.
    #[must_use]
    pub fn with_client(mut self, client: impl HttpClient + 'static) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Set the adapter.
    #[must_use]
    pub fn with_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    /// Replace the request body transforms.
    #[must_use]
    pub fn with_transform_request(mut self, transforms: Vec<Arc<dyn TransformRequest>>) -> Self {
        self.transform_request = Some(transforms);
        self
    }

    /// Replace the response body transforms.
    #[must_use]
    pub fn with_transform_response(
        mut self,
        transforms: Vec<Arc<dyn TransformResponse>>,
    ) -> Self {
        self.transform_response = Some(transforms);
        self
    }

    /// Append a request interceptor.
    #[must_use]
    pub fn with_request_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.add_request_interceptor(interceptor);
        self
    }

    /// Append a response interceptor.
    #[must_use]
    pub fn with_response_interceptor(
        mut self,
        interceptor: impl ResponseInterceptor + 'static,
    ) -> Self {
        self.add_response_interceptor(interceptor);
        self
    }

    /// Set the error hook.
    #[must_use]
    pub fn with_on_error(mut self, hook: impl OnError + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Set the completion hook.
    #[must_use]
    pub fn with_on_done(mut self, hook: impl OnDone + 'static) -> Self {
        self.on_done = Some(Arc::new(hook));
        self
    }

    /// Set the hook run before the wire request is built.
    #[must_use]
    pub fn with_on_before_new_request(mut self, hook: impl OnBeforeNewRequest + 'static) -> Self {
        self.on_before_new_request = Some(Arc::new(hook));
        self
    }

    /// Enable timing collection.
    #[must_use]
    pub const fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }

    /// Set the concurrency cap.
    #[must_use]
    pub const fn with_max_concurrency(mut self, max: i32) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set the JSON codec.
    #[must_use]
    pub fn with_json_codec(mut self, codec: impl JsonCodec + 'static) -> Self {
        self.json_codec = Arc::new(codec);
        self
    }

    /// Append a request interceptor.
    pub fn add_request_interceptor(&mut self, interceptor: impl RequestInterceptor + 'static) {
        self.request_interceptors.push(Arc::new(interceptor));
    }

    /// Insert a request interceptor first.
    pub fn prepend_request_interceptor(&mut self, interceptor: impl RequestInterceptor + 'static) {
        self.request_interceptors.insert(0, Arc::new(interceptor));
    }

    /// Append a response interceptor.
    pub fn add_response_interceptor(&mut self, interceptor: impl ResponseInterceptor + 'static) {
        self.response_interceptors.push(Arc::new(interceptor));
    }

    /// Insert a response interceptor first.
    pub fn prepend_response_interceptor(
        &mut self,
        interceptor: impl ResponseInterceptor + 'static,
    ) {
        self.response_interceptors.insert(0, Arc::new(interceptor));
    }
}

impl fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("request_interceptors", &self.request_interceptors.len())
            .field("response_interceptors", &self.response_interceptors.len())
            .field("enable_trace", &self.enable_trace)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use http::header::CONTENT_TYPE;

    use super::*;
    use crate::{BoxError, ContentType};

    fn encode_body(body: Body, headers: &mut HeaderMap) -> std::result::Result<Body, BoxError> {
        let (bytes, content_type) = match body {
            Body::Form(values) => (Bytes::from(values.encode()), ContentType::FormUrlEncoded),
            Body::Structured(value) => (Bytes::from(serde_json::to_vec(&value)?), ContentType::Json),
            Body::Text(text) => return Ok(Body::Bytes(Bytes::from(text))),
            other => return Ok(other),
        };
        headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type.as_str()));
        Ok(Body::Bytes(bytes))
    }

    fn vip_config() -> Config {
        let mut query = Values::new();
        query.add("a", "1").add("a", "2");
        let mut config = Config::new(Method::Post, "/users/:type")
            .base_url("http://test.com")
            .param("type", "vip")
            .query(query);
        let encode: Arc<dyn TransformRequest> = Arc::new(encode_body);
        config.transform_request = Some(vec![encode]);
        config
    }

    #[test]
    fn url_join_cases() {
        check!(url_join("", "/users") == "/users");
        check!(url_join("http://a.com", "https://b.com/x") == "https://b.com/x");
        check!(url_join("http://a.com/", "http://b.com") == "http://b.com");
        check!(url_join("http://a.com/", "/users") == "http://a.com/users");
        check!(url_join("http://a.com", "/users") == "http://a.com/users");
        check!(url_join("http://a.com/api", "users") == "http://a.com/apiusers");
        check!(url_join("http://a.com/", "users") == "http://a.com/users");
    }

    #[test]
    fn route_of_strips_authority_and_query() {
        check!(route_of("https://aslant.site/") == "/");
        check!(route_of("https://aslant.site/user/:type?x=1") == "/user/:type");
        check!(route_of("https://aslant.site") == "");
        check!(route_of("/users/:id#top") == "/users/:id");
    }

    #[test]
    fn substitute_only_known_params() {
        let params = HashMap::from([
            ("id".to_string(), "1".to_string()),
            ("id_ext".to_string(), "2".to_string()),
        ]);
        check!(substitute_params("/users/:id/:id_ext", &params) == "/users/1/2");
        check!(substitute_params("/users/:idx", &params) == "/users/:idx");
        check!(substitute_params("/users/:id:", &params) == "/users/1:");
        check!(substitute_params("http://a.com:8080/:id", &params) == "http://a.com:8080/1");
        check!(substitute_params("/users/:name", &HashMap::new()) == "/users/:name");
    }

    #[test]
    fn get_url_appends_query() {
        let config = vip_config();
        check!(config.get_url() == "http://test.com/users/vip?a=1&a=2");

        let mut config = Config::new(Method::Get, "http://test.com/?x=1");
        config.add_query("y", "2");
        check!(config.get_url() == "http://test.com/?x=1&y=2");

        let config = Config::new(Method::Get, "http://test.com/").query(Values::new());
        check!(config.get_url() == "http://test.com/");
    }

    #[test]
    fn query_helpers() {
        #[derive(serde::Serialize)]
        struct Filter {
            category: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            page: Option<u32>,
        }

        let mut config = Config::new(Method::Get, "/");
        config
            .add_query("type", "vip")
            .add_query_map(&HashMap::from([("sort", "asc")]));
        let_assert!(Ok(_) = config.add_query_struct(&Filter {
            category: "a".to_string(),
            page: None,
        }));
        config.add_param("id", "1");

        check!(config.get_url() == "/?category=a&sort=asc&type=vip");
        check!(config.params.get("id").map(String::as_str) == Some("1"));
    }

    #[test]
    fn side_channel_getters() {
        let mut config = Config::default();
        check!(config.get_str("missing").is_none());

        config.set("name", "relay");
        config.set("owned", String::from("x"));
        config.set("flag", true);
        config.set("count", 3_i32);

        check!(config.get_str("name") == Some("relay"));
        check!(config.get_str("owned") == Some("x"));
        check!(config.get_bool("flag") == Some(true));
        check!(config.get_int("count") == Some(3));
        check!(config.get_bool("name").is_none());
        check!(config.get_int("flag").is_none());
    }

    #[test]
    fn merge_keeps_call_fields() {
        let instance = InstanceConfig::new()
            .with_base_url("http://instance.com")
            .with_timeout(Duration::from_secs(5))
            .with_header(HeaderName::from_static("x-a"), HeaderValue::from_static("i"))
            .with_trace(true)
            .with_request_interceptor(|_: &mut Config| -> std::result::Result<(), BoxError> { Ok(()) });

        let mut config = Config::new(Method::Get, "/users")
            .base_url("http://call.com")
            .header(HeaderName::from_static("x-a"), HeaderValue::from_static("c"));
        config.merge(&instance);

        check!(config.base_url.as_deref() == Some("http://call.com"));
        check!(config.timeout == Some(Duration::from_secs(5)));
        check!(config.enable_trace);
        let values: Vec<_> = config.headers.get_all("x-a").iter().collect();
        check!(values == ["c", "i"]);
        check!(config.request_interceptors.as_ref().map(Vec::len) == Some(1));
        check!(config.json_codec.is_some());

        let mut config = Config::new(Method::Get, "/users");
        config.request_interceptors = Some(Vec::new());
        config.merge(&instance);
        check!(config.base_url.as_deref() == Some("http://instance.com"));
        check!(config.request_interceptors.as_ref().map(Vec::len) == Some(0));
    }

    #[test]
    fn interceptor_order() {
        let mut instance = InstanceConfig::new();
        let noop = |_: &mut Config| -> std::result::Result<(), BoxError> { Ok(()) };
        instance.add_request_interceptor(noop);
        instance.prepend_request_interceptor(|config: &mut Config| -> std::result::Result<(), BoxError> {
            config.set("first", true);
            Ok(())
        });

        let mut config = Config::default();
        let_assert!(Some(first) = instance.request_interceptors.first());
        let_assert!(Ok(()) = first.intercept(&mut config));
        check!(config.get_bool("first") == Some(true));
    }

    #[test]
    fn no_body_for_get_head_delete_options() {
        for method in [Method::Get, Method::Head, Method::Delete, Method::Options] {
            let mut config = Config::new(method, "/").body("abcd");
            let_assert!(Ok(None) = config.build_body());
        }
    }

    #[test]
    fn build_body_bytes_and_reader() {
        let mut config = Config::new(Method::Post, "/").body(Bytes::from_static(b"abcd"));
        let_assert!(Ok(Some(bytes)) = config.build_body());
        check!(bytes.as_ref() == b"abcd");

        let mut config = Config::new(Method::Put, "/").body(Body::reader(&b"from reader"[..]));
        let_assert!(Ok(Some(bytes)) = config.build_body());
        check!(bytes.as_ref() == b"from reader");
        check!(config.body.as_ref().and_then(Body::as_bytes) == Some(&bytes));
    }

    #[test]
    fn build_body_rejects_untransformed() {
        let mut config = Config::new(Method::Post, "/").body("text");
        let_assert!(Err(err) = config.build_body());
        check!(matches!(err.kind(), Some(ErrorKind::RequestDataTypeInvalid)));
        check!(err.message() == "request data type is not supported");
    }

    #[test]
    fn build_body_transform_error() {
        let mut config = Config::new(Method::Patch, "/").body("text");
        let reject: Arc<dyn TransformRequest> =
            Arc::new(|_: Body, _: &mut HeaderMap| -> std::result::Result<Body, BoxError> {
                Err("nope".into())
            });
        config.transform_request = Some(vec![reject]);
        let_assert!(Err(err) = config.build_body());
        check!(err.message() == "nope");
        let_assert!(Some(Body::Text(text)) = &config.body);
        check!(text == "text");
        check!(config.as_curl() == "curl -XPATCH '/'");
    }

    #[test]
    fn curl_json_body() {
        #[derive(serde::Serialize)]
        struct User {
            name: String,
            count: u32,
        }

        let mut config = vip_config()
            .json(&User {
                name: "nickname".to_string(),
                count: 10,
            })
            .expect("json");
        insta::assert_snapshot!(
            config.curl(),
            @r#"curl -XPOST -d '{"name":"nickname","count":10}' -H 'Content-Type:application/json;charset=utf-8' 'http://test.com/users/vip?a=1&a=2'"#
        );
        check!(config.as_curl() == config.curl());
    }

    #[test]
    fn curl_form_body() {
        let mut form = Values::new();
        form.add("name", "nickname").add("count", "10");
        let mut config = vip_config().body(form);
        insta::assert_snapshot!(
            config.curl(),
            @"curl -XPOST -d 'count=10&name=nickname' -H 'Content-Type:application/x-www-form-urlencoded;charset=utf-8' 'http://test.com/users/vip?a=1&a=2'"
        );
    }

    #[test]
    fn curl_without_body() {
        let mut config = vip_config();
        config.method = None;
        check!(config.curl() == "curl -XGET 'http://test.com/users/vip?a=1&a=2'");
    }

    #[test]
    fn canonical_names() {
        check!(canonical_header_name("content-type") == "Content-Type");
        check!(canonical_header_name("x-request-id") == "X-Request-Id");
        check!(canonical_header_name("accept") == "Accept");
    }
}
