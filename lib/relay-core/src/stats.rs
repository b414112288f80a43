//! Request statistics for logging and metrics pipelines.

use std::time::Duration;

use serde::Serialize;

use crate::{Config, Error, Response};

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestResult {
    /// The request returned a response without error.
    Success,
    /// The request failed.
    Fail,
}

/// Flat summary of one request.
///
/// `status` and `size` are -1 when no response was received. Timings are
/// whole milliseconds rounded up and stay zero unless tracing was enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Path template of the request.
    pub route: String,
    /// HTTP method.
    pub method: String,
    /// Outcome.
    pub result: RequestResult,
    /// Final URL.
    pub uri: String,
    /// Response status.
    pub status: i32,
    /// Response body length.
    pub size: i64,
    /// Connection came from the pool.
    pub reused: bool,
    /// Remote address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    /// Total time.
    #[serde(rename = "use")]
    pub total: u64,
    /// Name resolution time.
    pub dns_use: u64,
    /// TCP connect time.
    pub tcp_use: u64,
    /// TLS handshake time.
    pub tls_use: u64,
    /// Request write time.
    pub request_send_use: u64,
    /// Time to first response byte.
    pub server_processing_use: u64,
    /// Body read time.
    pub content_transfer_use: u64,
}

/// Round a duration up to whole milliseconds.
#[must_use]
pub fn ceil_to_ms(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    if duration.subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis.saturating_add(1)
    }
}

impl Stats {
    /// Summarize a request from its configuration and outcome.
    #[must_use]
    pub fn new(config: &Config, response: Option<&Response>, error: Option<&Error>) -> Self {
        let (status, size) = response.map_or((-1, -1), |response| {
            (
                i32::from(response.status()),
                i64::try_from(response.data().len()).unwrap_or(i64::MAX),
            )
        });
        let result = if error.is_some() {
            RequestResult::Fail
        } else {
            RequestResult::Success
        };

        let mut stats = Self {
            route: config.route.clone(),
            method: config.method.unwrap_or_default().to_string(),
            result,
            uri: config.get_url(),
            status,
            size,
            reused: false,
            addr: None,
            total: 0,
            dns_use: 0,
            tcp_use: 0,
            tls_use: 0,
            request_send_use: 0,
            server_processing_use: 0,
            content_transfer_use: 0,
        };

        if let Some(trace) = &config.trace {
            let timeline = trace.timeline();
            stats.reused = trace.reused();
            stats.addr = trace.addr();
            stats.total = ceil_to_ms(timeline.total);
            stats.dns_use = ceil_to_ms(timeline.dns);
            stats.tcp_use = ceil_to_ms(timeline.tcp);
            stats.tls_use = ceil_to_ms(timeline.tls);
            stats.request_send_use = ceil_to_ms(timeline.request_send);
            stats.server_processing_use = ceil_to_ms(timeline.server_processing);
            stats.content_transfer_use = ceil_to_ms(timeline.content_transfer);
        }
        stats
    }

    /// Summarize a successful request.
    #[must_use]
    pub fn from_response(response: &Response) -> Option<Self> {
        response
            .config()
            .map(|config| Self::new(config, Some(response), None))
    }

    /// Summarize a failed request.
    #[must_use]
    pub fn from_error(error: &Error) -> Option<Self> {
        error
            .config()
            .map(|config| Self::new(config, error.response(), Some(error)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::HeaderMap;
    use tokio::time::Instant;

    use super::*;
    use crate::{HttpTrace, Method, TracePhase};

    #[test]
    fn ceil_to_whole_millis() {
        assert_eq!(ceil_to_ms(Duration::ZERO), 0);
        assert_eq!(ceil_to_ms(Duration::from_millis(3)), 3);
        assert_eq!(ceil_to_ms(Duration::from_micros(3001)), 4);
        assert_eq!(ceil_to_ms(Duration::from_nanos(1)), 1);
    }

    #[test]
    fn stats_with_trace() {
        let base = Instant::now();
        let secs = Duration::from_secs;
        let trace = Arc::new(HttpTrace::new());
        trace.mark_at(TracePhase::Start, base + secs(1));
        trace.mark_at(TracePhase::DnsStart, base + secs(1));
        trace.mark_at(TracePhase::DnsDone, base + secs(3));
        trace.mark_at(TracePhase::ConnectStart, base + secs(1));
        trace.mark_at(TracePhase::ConnectDone, base + secs(4));
        trace.mark_at(TracePhase::TlsStart, base + secs(1));
        trace.mark_at(TracePhase::TlsDone, base + secs(5));
        trace.mark_at(TracePhase::GotConnection, base + secs(1));
        trace.mark_at(TracePhase::FirstResponseByte, base + secs(6));
        trace.mark_at(TracePhase::Done, base + secs(12));
        trace.set_connection("1.1.1.1:80", true);

        let mut config = Config::new(Method::Get, "/users/v1/me").base_url("http://127.0.0.1");
        config.route = "/users/v1/:type".to_string();
        config.trace = Some(trace);
        let response = Response::new(400, HeaderMap::new(), "test");
        let error = Error::create("fail", 400);

        let stats = Stats::new(&config, Some(&response), Some(&error));
        assert_eq!(stats.route, "/users/v1/:type");
        assert_eq!(stats.method, "GET");
        assert_eq!(stats.result, RequestResult::Fail);
        assert_eq!(stats.uri, "http://127.0.0.1/users/v1/me");
        assert_eq!(stats.status, 400);
        assert_eq!(stats.size, 4);
        assert!(stats.reused);
        assert_eq!(stats.addr.as_deref(), Some("1.1.1.1:80"));
        assert_eq!(stats.dns_use, 2000);
        assert_eq!(stats.tcp_use, 3000);
        assert_eq!(stats.tls_use, 4000);
        assert_eq!(stats.server_processing_use, 5000);
        assert_eq!(stats.content_transfer_use, 6000);
        assert_eq!(stats.total, 11000);
    }

    #[test]
    fn stats_without_response() {
        let config = Config::new(Method::Post, "http://test.com/users");
        let error = Error::create("refused", 500);
        let stats = Stats::new(&config, None, Some(&error));
        assert_eq!(stats.status, -1);
        assert_eq!(stats.size, -1);
        assert_eq!(stats.total, 0);

        let json = serde_json::to_value(&stats).expect("serialize");
        assert_eq!(json["method"], "POST");
        assert_eq!(json["result"], "fail");
        assert_eq!(json["use"], 0);
        assert_eq!(json["requestSendUse"], 0);
        assert!(json.get("addr").is_none());
    }

    #[test]
    fn stats_from_response_needs_config() {
        let response = Response::new(200, HeaderMap::new(), "ok");
        assert!(Stats::from_response(&response).is_none());

        let config = Arc::new(Config::new(Method::Get, "http://test.com/"));
        let response = response.with_config(config);
        let stats = Stats::from_response(&response).expect("stats");
        assert_eq!(stats.result, RequestResult::Success);
        assert_eq!(stats.status, 200);
        assert_eq!(stats.size, 2);
    }
}
