//! Error types for relay.
//!
//! Every failure surfaced by a request converges on a single [`Error`]: the
//! original cause, an HTTP-status-shaped code and a back-reference to the
//! [`Config`] that produced it. Library-originated causes are [`ErrorKind`]
//! values; hooks and adapters may fail with any error type.

use std::fmt;
use std::sync::Arc;

use derive_more::{Display, From};

use crate::{Config, ErrorCategory, Response, category};

/// Boxed error used for causes coming from hooks, transforms and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Error Kind
// ============================================================================

/// Causes raised by relay itself.
#[derive(Debug, Display, From)]
pub enum ErrorKind {
    /// The request body is not bytes or a reader after all transforms ran.
    #[display("request data type is not supported")]
    #[from(skip)]
    RequestDataTypeInvalid,

    /// The instance is disabled (negative max concurrency).
    #[display("request is forbidden")]
    #[from(skip)]
    RequestForbidden,

    /// The instance concurrency cap was exceeded.
    #[display("too many requests: {concurrency} in flight exceeds max of {max}")]
    #[from(skip)]
    TooManyRequests {
        /// In-flight count observed when the request was admitted.
        concurrency: u32,
        /// Configured cap.
        max: i32,
    },

    /// The request deadline expired.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The request context was canceled.
    #[display("request canceled")]
    #[from(skip)]
    Canceled,

    /// Transport-level failure reported by the HTTP client.
    #[display("transport error: {_0}")]
    #[from(skip)]
    Transport(BoxError),

    /// The transport could not resolve the host name.
    #[display("name resolution failed: {_0}")]
    #[from(skip)]
    Resolve(BoxError),

    /// I/O failure while reading a body.
    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),

    /// The final URL is not a valid URI.
    #[display("invalid URI: {_0}")]
    #[from]
    InvalidUri(http::uri::InvalidUri),

    /// The wire request was rejected by the `http` crate.
    #[display("invalid HTTP request: {_0}")]
    #[from]
    Http(http::Error),

    /// The wire request could not be assembled.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(String),

    /// A header name or value is invalid.
    #[display("invalid header: {_0}")]
    #[from(skip)]
    InvalidHeader(String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Form / query string serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_html_form::ser::Error),

    /// A response decoder failed on a body it claimed.
    #[display("{encoding} decoding failed: {source}")]
    #[from(skip)]
    Decompression {
        /// Content encoding that failed.
        encoding: &'static str,
        /// Underlying decoder error.
        source: std::io::Error,
    },

    /// No mocked response is registered for the route.
    #[display("no mock response for route '{_0}'")]
    #[from(skip)]
    MockNotFound(String),
}

impl std::error::Error for ErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) | Self::Resolve(err) => Some(err.as_ref()),
            Self::Io(err) | Self::Decompression { source: err, .. } => Some(err),
            Self::InvalidUri(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::JsonSerialization(err) => Some(err),
            Self::FormSerialization(err) => Some(err),
            _ => None,
        }
    }
}

impl ErrorKind {
    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a transport error from any underlying failure.
    #[must_use]
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Status code attached when this kind becomes an [`Error`].
    ///
    /// Zero means "no status", left for the pipeline to promote.
    #[must_use]
    pub const fn status_hint(&self) -> u16 {
        match self {
            Self::RequestForbidden => 403,
            Self::TooManyRequests { .. } => 429,
            _ => 0,
        }
    }
}

// ============================================================================
// Error
// ============================================================================

/// Structured error returned by every relay request.
pub struct Error {
    code: u16,
    message: String,
    cause: BoxError,
    config: Option<Arc<Config>>,
    response: Option<Box<Response>>,
}

impl Error {
    /// Wrap any failure into an [`Error`] with the given code.
    ///
    /// Wrapping is idempotent: when `err` already is an [`Error`] it is
    /// returned unchanged and `code` is ignored.
    #[must_use]
    pub fn create(err: impl Into<BoxError>, code: u16) -> Self {
        match err.into().downcast::<Self>() {
            Ok(err) => *err,
            Err(cause) => Self {
                code,
                message: cause.to_string(),
                cause,
                config: None,
                response: None,
            },
        }
    }

    /// Wrap any failure without a status code.
    #[must_use]
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::create(err, 0)
    }

    /// Attach the originating configuration, unless one is already attached.
    #[must_use]
    pub fn with_config(mut self, config: Arc<Config>) -> Self {
        if self.config.is_none() {
            self.config = Some(config);
        }
        self
    }

    /// Attach the response received before the failure, unless one is already attached.
    #[must_use]
    pub fn with_response(mut self, response: Response) -> Self {
        if self.response.is_none() {
            self.response = Some(Box::new(response));
        }
        self
    }

    /// Promote a missing code.
    ///
    /// A failure with code 0 takes the response status when it is an HTTP
    /// error (>= 400); otherwise it originated in client-side logic and
    /// becomes a 500.
    #[must_use]
    pub fn promote(mut self, status: Option<u16>) -> Self {
        if self.code == 0 {
            self.code = match status {
                Some(status) if status >= 400 => status,
                _ => 500,
            };
        }
        self
    }

    /// HTTP-status-shaped code, 0 when unknown.
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// Message of the underlying cause.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Underlying cause.
    #[must_use]
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// The cause as an [`ErrorKind`], when relay raised it.
    #[must_use]
    pub fn kind(&self) -> Option<&ErrorKind> {
        self.cause.downcast_ref()
    }

    /// The configuration of the failed request.
    #[must_use]
    pub fn config(&self) -> Option<&Config> {
        self.config.as_deref()
    }

    /// The response received before the failure, if any.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    /// Returns `true` if the cause is a deadline-class failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.category() == ErrorCategory::Timeout
    }

    /// Network category of the cause.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        category(self.cause.as_ref())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        let code = kind.status_hint();
        Self::create(kind, code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code != 0 {
            write!(f, "code={}, ", self.code)?;
        }
        write!(f, "message={}", self.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("cause", &self.cause)
            .field("route", &self.config.as_ref().map(|config| &config.route))
            .field("status", &self.response.as_ref().map(|resp| resp.status()))
            .finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn error_display() {
        let err = Error::create("boom", 500);
        assert_eq!(err.to_string(), "code=500, message=boom");

        let err = Error::other("boom");
        assert_eq!(err.to_string(), "message=boom");

        let err = Error::from(ErrorKind::Timeout);
        assert_eq!(err.to_string(), "message=request timeout");
    }

    #[test]
    fn create_is_idempotent() {
        let first = Error::create("boom", 502);
        let again = Error::create(first, 400);
        assert_eq!(again.code(), 502);
        assert_eq!(again.message(), "boom");

        let config = Arc::new(Config::new(Method::Get, "/users"));
        let wrapped = Error::create(Error::create(again, 0).with_config(config), 500);
        assert_eq!(wrapped.code(), 502);
        assert_eq!(wrapped.config().map(|c| c.url.as_str()), Some("/users"));
    }

    #[test]
    fn admission_kinds_carry_status() {
        assert_eq!(Error::from(ErrorKind::RequestForbidden).code(), 403);
        let err = Error::from(ErrorKind::TooManyRequests {
            concurrency: 3,
            max: 2,
        });
        assert_eq!(err.code(), 429);
        assert!(matches!(
            err.kind(),
            Some(ErrorKind::TooManyRequests { max: 2, .. })
        ));
    }

    #[test]
    fn promote_missing_code() {
        assert_eq!(Error::other("x").promote(None).code(), 500);
        assert_eq!(Error::other("x").promote(Some(200)).code(), 500);
        assert_eq!(Error::other("x").promote(Some(404)).code(), 404);
        assert_eq!(Error::create("x", 418).promote(Some(200)).code(), 418);
    }

    #[test]
    fn config_is_attached_once() {
        let first = Arc::new(Config::new(Method::Get, "/a"));
        let second = Arc::new(Config::new(Method::Get, "/b"));
        let err = Error::other("x").with_config(first).with_config(second);
        assert_eq!(err.config().map(|c| c.url.as_str()), Some("/a"));
    }

    #[test]
    fn timeout_predicate() {
        assert!(Error::from(ErrorKind::Timeout).is_timeout());
        assert!(!Error::from(ErrorKind::Canceled).is_timeout());
        let io = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert!(Error::other(ErrorKind::Io(io)).is_timeout());
    }

    #[test]
    fn error_source_is_cause() {
        use std::error::Error as _;

        let err = Error::from(ErrorKind::MockNotFound("/users/:id".to_string()));
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "no mock response for route '/users/:id'");
    }

    #[test]
    fn json_deserialization_display() {
        let kind = ErrorKind::json_deserialization("user.address.city", "missing field `city`");
        assert_eq!(
            kind.to_string(),
            "JSON deserialization error at 'user.address.city': missing field `city`"
        );
    }
}
