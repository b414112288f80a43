//! Network error categorization.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::iter::successors;

use crate::ErrorKind;

/// Coarse network category of a failure, used for statistics and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCategory {
    /// The request context was canceled.
    Canceled,
    /// A deadline expired (request or OS level).
    Timeout,
    /// Name resolution failed.
    Dns,
    /// Local address unavailable or in use.
    Addr,
    /// Connection aborted.
    Aborted,
    /// Connection refused.
    Refused,
    /// Connection reset by peer.
    Reset,
    /// Anything else.
    #[default]
    Unknown,
}

impl ErrorCategory {
    /// Category tag, empty for [`ErrorCategory::Unknown`].
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Canceled => "canceled",
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::Addr => "addr",
            Self::Aborted => "aborted",
            Self::Refused => "refused",
            Self::Reset => "reset",
            Self::Unknown => "",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a failure by walking its `source()` chain.
///
/// Checks run in priority order over the whole chain: cancellation,
/// timeouts, name resolution, local address errors and finally OS-level
/// connection errors. Unrecognized failures are [`ErrorCategory::Unknown`].
#[must_use]
pub fn category(err: &(dyn StdError + 'static)) -> ErrorCategory {
    let chain: Vec<&(dyn StdError + 'static)> =
        successors(Some(err), |err: &&(dyn StdError + 'static)| (*err).source()).collect();
    let kinds = || chain.iter().filter_map(|err| err.downcast_ref::<ErrorKind>());
    let io_kinds = || {
        chain
            .iter()
            .filter_map(|err| err.downcast_ref::<io::Error>())
            .map(io::Error::kind)
    };

    if kinds().any(|kind| matches!(kind, ErrorKind::Canceled)) {
        return ErrorCategory::Canceled;
    }
    if kinds().any(|kind| matches!(kind, ErrorKind::Timeout))
        || io_kinds().any(|kind| kind == io::ErrorKind::TimedOut)
    {
        return ErrorCategory::Timeout;
    }
    if kinds().any(|kind| matches!(kind, ErrorKind::Resolve(_))) {
        return ErrorCategory::Dns;
    }
    if io_kinds().any(|kind| {
        matches!(
            kind,
            io::ErrorKind::AddrNotAvailable | io::ErrorKind::AddrInUse
        )
    }) {
        return ErrorCategory::Addr;
    }

    io_kinds()
        .find_map(|kind| match kind {
            io::ErrorKind::ConnectionAborted => Some(ErrorCategory::Aborted),
            io::ErrorKind::ConnectionRefused => Some(ErrorCategory::Refused),
            io::ErrorKind::ConnectionReset => Some(ErrorCategory::Reset),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[derive(Debug, derive_more::Display)]
    #[display("{msg}")]
    struct Wrapper {
        msg: &'static str,
        source: io::Error,
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.source)
        }
    }

    fn io_err(kind: io::ErrorKind) -> Error {
        Error::other(ErrorKind::transport(io::Error::from(kind)))
    }

    #[test]
    fn categories_as_str() {
        assert_eq!(ErrorCategory::Canceled.as_str(), "canceled");
        assert_eq!(ErrorCategory::Refused.to_string(), "refused");
        assert_eq!(ErrorCategory::Unknown.as_str(), "");
        assert_eq!(ErrorCategory::Unknown.to_string(), "");
        for category in [
            ErrorCategory::Canceled,
            ErrorCategory::Timeout,
            ErrorCategory::Dns,
            ErrorCategory::Addr,
            ErrorCategory::Aborted,
            ErrorCategory::Refused,
            ErrorCategory::Reset,
        ] {
            assert_eq!(category.to_string(), category.as_str());
        }
    }

    #[test]
    fn canceled_and_timeout() {
        assert_eq!(
            Error::from(ErrorKind::Canceled).category(),
            ErrorCategory::Canceled
        );
        assert_eq!(
            Error::from(ErrorKind::Timeout).category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            io_err(io::ErrorKind::TimedOut).category(),
            ErrorCategory::Timeout
        );
    }

    #[test]
    fn connection_errors() {
        assert_eq!(
            io_err(io::ErrorKind::ConnectionRefused).category(),
            ErrorCategory::Refused
        );
        assert_eq!(
            io_err(io::ErrorKind::ConnectionReset).category(),
            ErrorCategory::Reset
        );
        assert_eq!(
            io_err(io::ErrorKind::ConnectionAborted).category(),
            ErrorCategory::Aborted
        );
        assert_eq!(
            io_err(io::ErrorKind::AddrNotAvailable).category(),
            ErrorCategory::Addr
        );
    }

    #[test]
    fn resolve_failure_is_dns() {
        let err = Error::other(ErrorKind::Resolve(Box::new(io::Error::other(
            "failed to lookup address information",
        ))));
        assert_eq!(err.category(), ErrorCategory::Dns);
    }

    #[test]
    fn dns_text_alone_is_not_dns() {
        let err = Error::other(ErrorKind::transport(Wrapper {
            msg: "dns error",
            source: io::Error::other("failed to lookup address information"),
        }));
        assert_eq!(err.category(), ErrorCategory::Unknown);
    }

    #[test]
    fn nested_connect_error() {
        let err = Error::other(ErrorKind::transport(Wrapper {
            msg: "tcp connect error",
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        }));
        assert_eq!(err.category(), ErrorCategory::Refused);
    }

    #[test]
    fn unknown_is_not_an_error() {
        assert_eq!(Error::other("boom").category(), ErrorCategory::Unknown);
        assert_eq!(
            Error::from(ErrorKind::RequestDataTypeInvalid).category(),
            ErrorCategory::Unknown
        );
    }
}
