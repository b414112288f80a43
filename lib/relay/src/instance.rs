//! Request orchestration.
//!
//! An [`Instance`] owns the defaults shared by its requests and counts the
//! requests in flight. [`Instance::request`] runs the whole pipeline:
//!
//! 1. merge the instance defaults into the call configuration
//! 2. admission: a negative cap rejects, a positive cap bounds in-flight calls
//! 3. `on_before_new_request`, then build the wire request (route, URL, body)
//! 4. attach the trace collector and the timeout context
//! 5. request interceptors, adapter, response transforms, response interceptors
//! 6. promote the error code, `on_error`, then `on_done`
//!
//! # Example
//!
//! ```no_run
//! use relay::{Instance, InstanceConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> relay::Result<()> {
//! let instance = Instance::new(
//!     InstanceConfig::new()
//!         .with_base_url("https://api.example.com")
//!         .with_timeout(Duration::from_secs(5)),
//! );
//! let response = instance.get("/users/me", None).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::time::Instant;

use http::Uri;
use http::header::{ACCEPT_ENCODING, HeaderValue, USER_AGENT};
use relay_core::{
    Adapter, Body, Config, Context, DropGuard, ErrorKind, Form, HttpTrace, InstanceConfig,
    Method, Request, SerdeJson, TracePhase, Values, route_of,
};
use serde::de::DeserializeOwned;
use tracing::{Instrument, Span, debug, debug_span, field, warn};

use crate::adapter::DefaultAdapter;
use crate::transform::{default_transform_request, default_transform_response};
use crate::{Error, Response, Result};

/// `User-Agent` sent when the request sets none.
pub const DEFAULT_USER_AGENT: &str = concat!("relay/", env!("CARGO_PKG_VERSION"));

/// `Accept-Encoding` sent when the request sets none: what the default
/// response transforms decode.
pub const DEFAULT_ACCEPT_ENCODING: &str = "gzip, br";

/// Slot held in the in-flight counter, released on drop.
struct InFlight<'a> {
    counter: &'a AtomicU32,
    snapshot: u32,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU32) -> Self {
        let snapshot = counter.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        Self { counter, snapshot }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A reusable client carrying shared defaults and concurrency state.
///
/// Safe to share across tasks (`Arc<Instance>`). The defaults may be edited
/// between calls with [`Instance::config_mut`] or [`Instance::update_config`];
/// editing them while requests are in flight is allowed but those requests
/// may observe either version.
pub struct Instance {
    config: RwLock<InstanceConfig>,
    concurrency: AtomicU32,
    mock: Mutex<Option<Arc<dyn Adapter>>>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("config", &*self.defaults())
            .field("concurrency", &self.concurrency())
            .field("mocked", &self.mocked().is_some())
            .finish()
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new(InstanceConfig::default())
    }
}

impl Instance {
    /// Create an instance with the given defaults.
    #[must_use]
    pub fn new(config: InstanceConfig) -> Self {
        Self {
            config: RwLock::new(config),
            concurrency: AtomicU32::new(0),
            mock: Mutex::new(None),
        }
    }

    fn defaults(&self) -> RwLockReadGuard<'_, InstanceConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the instance defaults.
    #[must_use]
    pub fn config(&self) -> InstanceConfig {
        self.defaults().clone()
    }

    /// Mutable access to the instance defaults.
    pub fn config_mut(&mut self) -> &mut InstanceConfig {
        self.config.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Edit the instance defaults through a shared reference.
    pub fn update_config<R>(&self, f: impl FnOnce(&mut InstanceConfig) -> R) -> R {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut config)
    }

    fn mocked(&self) -> Option<Arc<dyn Adapter>> {
        self.mock.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Requests currently in flight.
    #[must_use]
    pub fn concurrency(&self) -> u32 {
        self.concurrency.load(Ordering::Acquire)
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Run a request through the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] carrying the configuration and, when one was
    /// received, the response. Its code is the response status for HTTP
    /// errors, the admission status (403, 429) for rejected calls, and 500
    /// for any other failure.
    pub async fn request(&self, mut config: Config) -> Result<Response> {
        if config.adapter.is_none() {
            config.adapter = self.mocked();
        }
        let max_concurrency = {
            let defaults = self.defaults();
            config.merge(&defaults);
            defaults.max_concurrency
        };
        let span = debug_span!(
            "http_request",
            method = %config.method.unwrap_or_default(),
            route = field::Empty
        );

        async move {
            let start = Instant::now();
            let (in_flight, result) = match self.admit(&mut config, max_concurrency) {
                Ok(in_flight) => (Some(in_flight), Self::exchange(&mut config).await),
                Err(err) => (None, Err(err)),
            };

            let config = Arc::new(config);
            let result = result
                .and_then(|response| Self::receive(response.with_config(Arc::clone(&config)), &config));
            drop(in_flight);

            Self::settle(&config, result, start)
        }
        .instrument(span)
        .await
    }

    /// Increment, then check the cap; the slot is released on every path.
    fn admit(&self, config: &mut Config, max_concurrency: i32) -> Result<InFlight<'_>> {
        if max_concurrency < 0 {
            return Err(ErrorKind::RequestForbidden.into());
        }
        let in_flight = InFlight::enter(&self.concurrency);
        config.concurrency = in_flight.snapshot;
        if let Ok(max @ 1..) = u32::try_from(max_concurrency)
            && in_flight.snapshot > max
        {
            return Err(ErrorKind::TooManyRequests {
                concurrency: in_flight.snapshot,
                max: max_concurrency,
            }
            .into());
        }
        Ok(in_flight)
    }

    /// Build the wire request, run the request interceptors and call the adapter.
    async fn exchange(config: &mut Config) -> Result<Response> {
        let adapter: Arc<dyn Adapter> = config
            .adapter
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultAdapter));
        if config.transform_request.is_none() {
            let codec = config
                .json_codec
                .clone()
                .unwrap_or_else(|| Arc::new(SerdeJson));
            config.transform_request = Some(default_transform_request(codec));
        }
        if config.transform_response.is_none() {
            config.transform_response = Some(default_transform_response());
        }

        if let Some(hook) = config.on_before_new_request.clone() {
            hook.before_new_request(config).map_err(Error::other)?;
        }

        let request = Self::build_request(config)?;
        config.request = Some(request);

        let parent = config.context.clone().unwrap_or_default();
        let (context, _release): (Context, Option<DropGuard>) =
            match config.timeout.filter(|timeout| !timeout.is_zero()) {
                Some(timeout) => {
                    let (context, guard) = parent.with_timeout(timeout);
                    (context, Some(guard))
                }
                None => (parent, None),
            };
        config.context = Some(context.clone());

        for interceptor in config.request_interceptors.clone().into_iter().flatten() {
            interceptor.intercept(config).map_err(Error::other)?;
        }

        debug!(
            uri = %config.request.as_ref().map(Request::uri).map(ToString::to_string).unwrap_or_default(),
            concurrency = config.concurrency,
            "sending request"
        );
        let result = context.run(adapter.call(config)).await;
        if let Some(trace) = &config.trace {
            trace.finish();
        }
        result
    }

    /// Route, final URL, encoded body, headers and trace collector.
    ///
    /// `url` is rewritten to the final URL; the base URL, parameters and
    /// query it was built from are cleared so it is not built twice.
    fn build_request(config: &mut Config) -> Result<Request> {
        let method = config.method.unwrap_or_default();
        config.method = Some(method);
        config.route = route_of(&config.joined_url()).to_string();
        Span::current().record("route", config.route.as_str());

        config.url = config.get_url();
        config.base_url = None;
        config.params.clear();
        config.query = None;
        let uri: Uri = config.url.parse().map_err(ErrorKind::from)?;
        let body = config.build_body()?;

        let mut builder = Request::builder(method, uri).headers(&config.headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if config.enable_trace {
            let trace = Arc::new(HttpTrace::new());
            trace.mark(TracePhase::Start);
            builder = builder.extension(Arc::clone(&trace));
            config.trace = Some(trace);
        }

        let mut request = builder.build();
        let headers = request.headers_mut();
        headers
            .entry(USER_AGENT)
            .or_insert(HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers
            .entry(ACCEPT_ENCODING)
            .or_insert(HeaderValue::from_static(DEFAULT_ACCEPT_ENCODING));
        Ok(request)
    }

    /// Response transforms, then response interceptors.
    fn receive(mut response: Response, config: &Config) -> Result<Response> {
        for transform in config.transform_response.iter().flatten() {
            let data = response.data().clone();
            match transform.transform(data, response.headers_mut()) {
                Ok(data) => response.set_data(data),
                Err(err) => return Err(Error::other(err).with_response(response)),
            }
        }
        for interceptor in config.response_interceptors.iter().flatten() {
            if let Err(err) = interceptor.intercept(&mut response) {
                return Err(Error::other(err).with_response(response));
            }
        }
        Ok(response)
    }

    /// Promote the error code, then run `on_error` and `on_done`.
    fn settle(config: &Arc<Config>, result: Result<Response>, start: Instant) -> Result<Response> {
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(response) => {
                debug!(
                    status = response.status(),
                    size = response.data().len(),
                    elapsed_ms,
                    "request completed"
                );
                if let Some(hook) = &config.on_done {
                    hook.on_done(config, Some(&response), None);
                }
                Ok(response)
            }
            Err(err) => {
                let status = err.response().map(Response::status);
                let mut err = err.with_config(Arc::clone(config)).promote(status);
                if let Some(replacement) = config.on_error.as_ref().and_then(|hook| hook.on_error(&err)) {
                    let mut replaced = Error::other(replacement).with_config(Arc::clone(config));
                    if let Some(response) = err.response() {
                        replaced = replaced.with_response(response.clone());
                    }
                    err = replaced.promote(status);
                }
                warn!(
                    code = err.code(),
                    category = %err.category(),
                    error = %err.message(),
                    elapsed_ms,
                    "request failed"
                );
                if let Some(hook) = &config.on_done {
                    hook.on_done(config, err.response(), Some(&err));
                }
                Err(err)
            }
        }
    }

    /// Run a request and decode the body with [`Response::json`].
    ///
    /// Decoding happens after the pipeline: a decode failure does not go
    /// through `on_error`.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error, or [`ErrorKind::JsonDeserialization`]
    /// when the body does not match `T`.
    pub async fn request_as<T: DeserializeOwned>(&self, config: Config) -> Result<T> {
        self.request(config).await?.json()
    }

    // ========================================================================
    // Verbs
    // ========================================================================

    fn verb(method: Method, url: &str, query: Option<Values>) -> Config {
        let mut config = Config::new(method, url);
        config.query = query;
        config
    }

    fn verb_with_body(method: Method, url: &str, body: Body, query: Option<Values>) -> Config {
        let mut config = Self::verb(method, url, query);
        config.body = Some(body);
        config
    }

    /// GET request.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn get(&self, url: &str, query: Option<Values>) -> Result<Response> {
        self.request(Self::verb(Method::Get, url, query)).await
    }

    /// GET request bound to a context.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn get_with_context(
        &self,
        ctx: &Context,
        url: &str,
        query: Option<Values>,
    ) -> Result<Response> {
        self.request(Self::verb(Method::Get, url, query).context(ctx.clone()))
            .await
    }

    /// DELETE request.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn delete(&self, url: &str, query: Option<Values>) -> Result<Response> {
        self.request(Self::verb(Method::Delete, url, query)).await
    }

    /// DELETE request bound to a context.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn delete_with_context(
        &self,
        ctx: &Context,
        url: &str,
        query: Option<Values>,
    ) -> Result<Response> {
        self.request(Self::verb(Method::Delete, url, query).context(ctx.clone()))
            .await
    }

    /// HEAD request.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn head(&self, url: &str, query: Option<Values>) -> Result<Response> {
        self.request(Self::verb(Method::Head, url, query)).await
    }

    /// HEAD request bound to a context.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn head_with_context(
        &self,
        ctx: &Context,
        url: &str,
        query: Option<Values>,
    ) -> Result<Response> {
        self.request(Self::verb(Method::Head, url, query).context(ctx.clone()))
            .await
    }

    /// OPTIONS request.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn options(&self, url: &str, query: Option<Values>) -> Result<Response> {
        self.request(Self::verb(Method::Options, url, query)).await
    }

    /// OPTIONS request bound to a context.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn options_with_context(
        &self,
        ctx: &Context,
        url: &str,
        query: Option<Values>,
    ) -> Result<Response> {
        self.request(Self::verb(Method::Options, url, query).context(ctx.clone()))
            .await
    }

    /// POST request.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn post(
        &self,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<Response> {
        self.request(Self::verb_with_body(Method::Post, url, body.into(), query))
            .await
    }

    /// POST request bound to a context.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn post_with_context(
        &self,
        ctx: &Context,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<Response> {
        let config = Self::verb_with_body(Method::Post, url, body.into(), query);
        self.request(config.context(ctx.clone())).await
    }

    /// PUT request.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn put(
        &self,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<Response> {
        self.request(Self::verb_with_body(Method::Put, url, body.into(), query))
            .await
    }

    /// PUT request bound to a context.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn put_with_context(
        &self,
        ctx: &Context,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<Response> {
        let config = Self::verb_with_body(Method::Put, url, body.into(), query);
        self.request(config.context(ctx.clone())).await
    }

    /// PATCH request.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn patch(
        &self,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<Response> {
        self.request(Self::verb_with_body(Method::Patch, url, body.into(), query))
            .await
    }

    /// PATCH request bound to a context.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn patch_with_context(
        &self,
        ctx: &Context,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<Response> {
        let config = Self::verb_with_body(Method::Patch, url, body.into(), query);
        self.request(config.context(ctx.clone())).await
    }

    /// POST a multipart form.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn upload(&self, url: &str, form: Form, query: Option<Values>) -> Result<Response> {
        self.upload_with_context(&Context::background(), url, form, query)
            .await
    }

    /// POST a multipart form bound to a context.
    ///
    /// # Errors
    ///
    /// See [`Instance::request`].
    pub async fn upload_with_context(
        &self,
        ctx: &Context,
        url: &str,
        form: Form,
        query: Option<Values>,
    ) -> Result<Response> {
        let (content_type, body) = form.into_parts();
        let config = Self::verb_with_body(Method::Post, url, Body::Bytes(body), query)
            .try_header("content-type", &content_type)?
            .context(ctx.clone());
        self.request(config).await
    }

    // ========================================================================
    // Decoding verbs
    // ========================================================================

    /// GET request decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn get_as<T: DeserializeOwned>(&self, url: &str, query: Option<Values>) -> Result<T> {
        self.request_as(Self::verb(Method::Get, url, query)).await
    }

    /// GET request bound to a context, decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn get_as_with_context<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        url: &str,
        query: Option<Values>,
    ) -> Result<T> {
        self.request_as(Self::verb(Method::Get, url, query).context(ctx.clone()))
            .await
    }

    /// DELETE request decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn delete_as<T: DeserializeOwned>(
        &self,
        url: &str,
        query: Option<Values>,
    ) -> Result<T> {
        self.request_as(Self::verb(Method::Delete, url, query)).await
    }

    /// DELETE request bound to a context, decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn delete_as_with_context<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        url: &str,
        query: Option<Values>,
    ) -> Result<T> {
        self.request_as(Self::verb(Method::Delete, url, query).context(ctx.clone()))
            .await
    }

    /// POST request decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn post_as<T: DeserializeOwned>(
        &self,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<T> {
        self.request_as(Self::verb_with_body(Method::Post, url, body.into(), query))
            .await
    }

    /// POST request bound to a context, decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn post_as_with_context<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<T> {
        let config = Self::verb_with_body(Method::Post, url, body.into(), query);
        self.request_as(config.context(ctx.clone())).await
    }

    /// PUT request decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn put_as<T: DeserializeOwned>(
        &self,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<T> {
        self.request_as(Self::verb_with_body(Method::Put, url, body.into(), query))
            .await
    }

    /// PUT request bound to a context, decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn put_as_with_context<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<T> {
        let config = Self::verb_with_body(Method::Put, url, body.into(), query);
        self.request_as(config.context(ctx.clone())).await
    }

    /// PATCH request decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn patch_as<T: DeserializeOwned>(
        &self,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<T> {
        self.request_as(Self::verb_with_body(Method::Patch, url, body.into(), query))
            .await
    }

    /// PATCH request bound to a context, decoded as `T`.
    ///
    /// # Errors
    ///
    /// See [`Instance::request_as`].
    pub async fn patch_as_with_context<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        url: &str,
        body: impl Into<Body>,
        query: Option<Values>,
    ) -> Result<T> {
        let config = Self::verb_with_body(Method::Patch, url, body.into(), query);
        self.request_as(config.context(ctx.clone())).await
    }

    // ========================================================================
    // Mocking
    // ========================================================================

    /// Answer every request with `response` until the guard is dropped.
    ///
    /// The override replaces the instance adapter, not one set on the call.
    /// Not meant to race with requests in flight.
    pub fn mock(&self, response: Response) -> MockGuard<'_> {
        self.replace_adapter(move |_: &mut Config| -> Result<Response> { Ok(response.clone()) })
    }

    /// Answer each request with the response registered for its route.
    ///
    /// Routes are path templates (`/users/:id`), not substituted URLs. A
    /// request whose route has no response fails with
    /// [`ErrorKind::MockNotFound`].
    pub fn multi_mock(&self, responses: HashMap<String, Response>) -> MockGuard<'_> {
        self.replace_adapter(move |config: &mut Config| -> Result<Response> {
            responses
                .get(&config.route)
                .cloned()
                .ok_or_else(|| ErrorKind::MockNotFound(config.route.clone()).into())
        })
    }

    fn replace_adapter(&self, adapter: impl Adapter + 'static) -> MockGuard<'_> {
        let previous = self
            .mock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(adapter));
        MockGuard {
            instance: self,
            previous: Some(previous),
        }
    }
}

/// Removes the override installed by [`Instance::mock`] or
/// [`Instance::multi_mock`] when dropped, restoring any earlier one.
#[must_use = "the mock is removed as soon as the guard is dropped"]
pub struct MockGuard<'a> {
    instance: &'a Instance,
    previous: Option<Option<Arc<dyn Adapter>>>,
}

impl MockGuard<'_> {
    /// Remove the override now.
    pub fn restore(mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self
                .instance
                .mock
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = previous;
        }
    }
}

impl Drop for MockGuard<'_> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl fmt::Debug for MockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockGuard")
            .field("active", &self.previous.is_some())
            .finish()
    }
}
