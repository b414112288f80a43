//! Pooled hyper transport behind the [`HttpClient`](relay_core::HttpClient) seam.

use std::error::Error as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::header::CONTENT_LENGTH;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{
        Client,
        connect::{HttpConnector, HttpInfo},
    },
    rt::{TokioExecutor, TokioTimer},
};
use relay_core::{ErrorKind, HttpTrace, TracePhase};
use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::{
    Error, Request, Response, Result,
    config::{ClientConfig, ClientConfigBuilder},
    connector::https_connector,
    middleware::LoggingLayer,
};

/// Upper bound for the body buffer preallocated from `Content-Length`.
const MAX_PREALLOCATION: usize = 1 << 20;

/// Resolver failures only surface as a connect error whose cause reads
/// "dns error"; everything else stays a plain transport error.
fn transport_error(err: hyper_util::client::legacy::Error) -> ErrorKind {
    if err.is_connect() && resolve_failed(&err) {
        ErrorKind::Resolve(Box::new(err))
    } else {
        ErrorKind::transport(err)
    }
}

fn resolve_failed(err: &hyper_util::client::legacy::Error) -> bool {
    let mut cause = err.source();
    while let Some(current) = cause {
        if current.to_string().starts_with("dns error") {
            return true;
        }
        cause = current.source();
    }
    false
}

/// Transport stack after all tower layers are applied.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Future returned by [`HyperClient`] calls.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// `BoxCloneService` is not `Sync`; each call clones the stack out of the lock.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request) -> ServiceFuture {
        let mut service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.call(request).await })
    }
}

/// Innermost service: the hyper-util legacy client.
#[derive(Clone)]
struct RawHyperClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl RawHyperClient {
    fn new(config: &ClientConfig) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(https_connector(config));

        Self { inner }
    }

    fn content_length(headers: &http::HeaderMap) -> usize {
        headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or_default()
            .min(MAX_PREALLOCATION)
    }

    /// Send the request and read the whole body.
    ///
    /// The pooled client hides connection setup and the write: only the
    /// response head, the end of the body and the peer address are traced.
    async fn execute(&self, request: Request) -> Result<Response> {
        let trace = request.extensions().get::<Arc<HttpTrace>>().cloned();
        let http_request = request.into_http().map(Full::new);

        let response = self
            .inner
            .request(http_request)
            .await
            .map_err(transport_error)?;
        if let Some(trace) = &trace {
            trace.mark(TracePhase::FirstResponseByte);
            if let Some(info) = response.extensions().get::<HttpInfo>() {
                trace.set_connection(info.remote_addr().to_string(), false);
            }
        }

        let (parts, mut body) = response.into_parts();
        let mut data = BytesMut::with_capacity(Self::content_length(&parts.headers));
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(ErrorKind::transport)?;
            if let Ok(chunk) = frame.into_data() {
                data.extend_from_slice(&chunk);
            }
        }
        if let Some(trace) = &trace {
            trace.mark(TracePhase::Done);
        }

        Ok(Response::new(parts.status.as_u16(), parts.headers, data.freeze()))
    }
}

impl Service<Request> for RawHyperClient {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.execute(request).await })
    }
}

/// Default [`HttpClient`](relay_core::HttpClient): pooled connections over rustls,
/// optionally wrapped in tower layers.
///
/// # Example
///
/// ```no_run
/// use relay::HyperClient;
/// use std::time::Duration;
///
/// let client = HyperClient::new();
///
/// let client = HyperClient::builder()
///     .connect_timeout(Duration::from_secs(2))
///     .with_logging()
///     .build();
/// ```
#[derive(Clone)]
pub struct HyperClient {
    service: SyncService,
    config: ClientConfig,
}

impl std::fmt::Debug for HyperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperClient {
    /// Client with default transport settings and no layers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Client with the given transport settings and no layers.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let raw = RawHyperClient::new(&config);
        Self::with_service(BoxCloneService::new(raw), config)
    }

    fn with_service(service: BoxedService, config: ClientConfig) -> Self {
        Self {
            service: SyncService::new(service),
            config,
        }
    }

    /// Start a [`HyperClientBuilder`].
    #[must_use]
    pub fn builder() -> HyperClientBuilder {
        HyperClientBuilder::default()
    }

    /// Transport settings in use.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl relay_core::HttpClient for HyperClient {
    fn execute(&self, request: Request) -> futures_util::future::BoxFuture<'static, Result<Response>> {
        self.service.call(request)
    }
}

impl Service<Request> for HyperClient {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.service.call(request)
    }
}

/// Builder for [`HyperClient`].
///
/// # Example
///
/// ```no_run
/// use relay::HyperClient;
/// use relay::middleware::LoggingLayer;
///
/// let client = HyperClient::builder()
///     .pool_idle_per_host(8)
///     .layer(LoggingLayer::debug())
///     .build();
/// ```
#[derive(Default)]
pub struct HyperClientBuilder {
    config: ClientConfigBuilder,
    layers: Vec<Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>>,
}

impl std::fmt::Debug for HyperClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClientBuilder")
            .field("config", &self.config)
            .field("layers_count", &self.layers.len())
            .finish()
    }
}

impl HyperClientBuilder {
    /// Limit on establishing the TCP connection.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Idle connections kept per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// How long an idle connection stays in the pool.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Disable Nagle's algorithm on new sockets.
    #[must_use]
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config = self.config.nodelay(nodelay);
        self
    }

    /// Wrap the transport in a tower layer.
    ///
    /// The last layer added is the outermost one.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send,
    {
        self.layers.push(Arc::new(move |service| {
            BoxCloneService::new(layer.layer(service))
        }));
        self
    }

    /// Log each exchange at info level.
    #[must_use]
    pub fn with_logging(self) -> Self {
        self.layer(LoggingLayer::new())
    }

    /// Log each exchange at debug level, headers included.
    #[must_use]
    pub fn with_debug_logging(self) -> Self {
        self.layer(LoggingLayer::debug())
    }

    /// Stack the layers over a fresh pool.
    #[must_use]
    pub fn build(self) -> HyperClient {
        let config = self.config.build();
        let mut service: BoxedService = BoxCloneService::new(RawHyperClient::new(&config));

        for wrap in self.layers {
            service = wrap(service);
        }

        HyperClient::with_service(service, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_default() {
        let client = HyperClient::new();
        assert_eq!(client.config().pool_idle_per_host, 32);
    }

    #[test]
    fn client_builder() {
        let client = HyperClient::builder()
            .connect_timeout(Duration::from_secs(3))
            .pool_idle_per_host(16)
            .with_logging()
            .build();

        assert_eq!(client.config().connect_timeout, Duration::from_secs(3));
        assert_eq!(client.config().pool_idle_per_host, 16);
    }

    #[test]
    fn client_is_debug() {
        let client = HyperClient::new();
        let debug = format!("{client:?}");
        assert!(debug.contains("HyperClient"));
    }

    #[test]
    fn content_length_hint_is_bounded() {
        let mut headers = http::HeaderMap::new();
        assert_eq!(RawHyperClient::content_length(&headers), 0);

        headers.insert(CONTENT_LENGTH, http::HeaderValue::from_static("42"));
        assert_eq!(RawHyperClient::content_length(&headers), 42);

        headers.insert(CONTENT_LENGTH, http::HeaderValue::from_static("99999999999"));
        assert_eq!(RawHyperClient::content_length(&headers), MAX_PREALLOCATION);
    }
}
