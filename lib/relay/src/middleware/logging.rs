//! Transport logging middleware.
//!
//! Logs every wire exchange with the `tracing` crate. The instance already
//! logs each call at debug level; this layer adds the view from the
//! transport, after interceptors ran.

use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::client::ServiceFuture;
use crate::{Error, Request, Response, Result};

/// Layer that adds exchange logging.
///
/// # Example
///
/// ```no_run
/// use relay::HyperClient;
/// use relay::middleware::LoggingLayer;
///
/// let client = HyperClient::builder().layer(LoggingLayer::debug()).build();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

/// Verbosity of the logging middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level, with request and response headers.
    Debug,
    /// Log at info level, summary only.
    #[default]
    Info,
}

impl LoggingLayer {
    /// Create a new logging layer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging layer that logs at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// Configured verbosity.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

/// Service that logs wire exchanges.
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let method = request.method();
        let uri = request.uri().clone();
        let level = self.level;

        let span = span!(Level::INFO, "http_exchange", %method, %uri);

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let start = Instant::now();

                match level {
                    LogLevel::Debug => {
                        debug!(headers = ?request.headers(), "sending request");
                    }
                    LogLevel::Info => info!("sending request"),
                }

                let result = inner.call(request).await;
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) if level == LogLevel::Debug => {
                        debug!(
                            status = response.status(),
                            size = response.data().len(),
                            headers = ?response.headers(),
                            elapsed_ms,
                            "response received"
                        );
                    }
                    Ok(response) if response.status() < 400 => {
                        info!(status = response.status(), elapsed_ms, "response received");
                    }
                    Ok(response) => {
                        warn!(status = response.status(), elapsed_ms, "response with HTTP error");
                    }
                    Err(err) => {
                        warn!(error = %err, category = %err.category(), elapsed_ms, "exchange failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
