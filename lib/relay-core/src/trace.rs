//! Per-request timing collection.
//!
//! The instance creates an [`HttpTrace`] when tracing is enabled and hands it
//! to the transport through the wire request extensions. The transport marks
//! the phases it can observe; unobserved phases report zero.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Observable points of an HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TracePhase {
    /// The request pipeline handed the request to the transport.
    Start,
    /// Name resolution started.
    DnsStart,
    /// Name resolution finished.
    DnsDone,
    /// TCP connect started.
    ConnectStart,
    /// TCP connect finished.
    ConnectDone,
    /// TLS handshake started.
    TlsStart,
    /// TLS handshake finished.
    TlsDone,
    /// A connection was obtained (new or reused).
    GotConnection,
    /// The request was fully written.
    WroteRequest,
    /// The response head arrived.
    FirstResponseByte,
    /// The response body was fully read.
    Done,
}

#[derive(Debug, Default)]
struct Marks {
    start: Option<Instant>,
    dns_start: Option<Instant>,
    dns_done: Option<Instant>,
    connect_start: Option<Instant>,
    connect_done: Option<Instant>,
    tls_start: Option<Instant>,
    tls_done: Option<Instant>,
    got_connection: Option<Instant>,
    wrote_request: Option<Instant>,
    first_response_byte: Option<Instant>,
    done: Option<Instant>,
    addr: Option<String>,
    reused: bool,
}

impl Marks {
    fn slot(&mut self, phase: TracePhase) -> &mut Option<Instant> {
        match phase {
            TracePhase::Start => &mut self.start,
            TracePhase::DnsStart => &mut self.dns_start,
            TracePhase::DnsDone => &mut self.dns_done,
            TracePhase::ConnectStart => &mut self.connect_start,
            TracePhase::ConnectDone => &mut self.connect_done,
            TracePhase::TlsStart => &mut self.tls_start,
            TracePhase::TlsDone => &mut self.tls_done,
            TracePhase::GotConnection => &mut self.got_connection,
            TracePhase::WroteRequest => &mut self.wrote_request,
            TracePhase::FirstResponseByte => &mut self.first_response_byte,
            TracePhase::Done => &mut self.done,
        }
    }
}

fn between(from: Option<Instant>, to: Option<Instant>) -> Duration {
    match (from, to) {
        (Some(from), Some(to)) => to.saturating_duration_since(from),
        _ => Duration::ZERO,
    }
}

/// Phase durations of one exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeline {
    /// Name resolution.
    pub dns: Duration,
    /// TCP connect.
    pub tcp: Duration,
    /// TLS handshake.
    pub tls: Duration,
    /// Connection obtained to request written.
    pub request_send: Duration,
    /// Request written (or connection obtained) to first response byte.
    pub server_processing: Duration,
    /// First response byte to body fully read.
    pub content_transfer: Duration,
    /// Start to body fully read.
    pub total: Duration,
}

/// Thread-safe timing collector for a single request.
#[derive(Debug, Default)]
pub struct HttpTrace {
    marks: Mutex<Marks>,
}

impl HttpTrace {
    /// Create an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_marks<R>(&self, f: impl FnOnce(&mut Marks) -> R) -> R {
        let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut marks)
    }

    /// Record `phase` as happening now.
    pub fn mark(&self, phase: TracePhase) {
        self.mark_at(phase, Instant::now());
    }

    /// Record `phase` at a given instant.
    pub fn mark_at(&self, phase: TracePhase, at: Instant) {
        self.with_marks(|marks| *marks.slot(phase) = Some(at));
    }

    /// Record the connection used for the exchange.
    pub fn set_connection(&self, addr: impl Into<String>, reused: bool) {
        self.with_marks(|marks| {
            marks.addr = Some(addr.into());
            marks.reused = reused;
        });
    }

    /// Mark the exchange as finished, unless the transport already did.
    pub fn finish(&self) {
        let now = Instant::now();
        self.with_marks(|marks| {
            marks.done.get_or_insert(now);
        });
    }

    /// Remote address of the connection, when known.
    #[must_use]
    pub fn addr(&self) -> Option<String> {
        self.with_marks(|marks| marks.addr.clone())
    }

    /// Returns `true` if the connection came from the pool.
    #[must_use]
    pub fn reused(&self) -> bool {
        self.with_marks(|marks| marks.reused)
    }

    /// Phase durations recorded so far.
    #[must_use]
    pub fn timeline(&self) -> Timeline {
        self.with_marks(|marks| {
            let sent = marks.wrote_request.or(marks.got_connection);
            Timeline {
                dns: between(marks.dns_start, marks.dns_done),
                tcp: between(marks.connect_start, marks.connect_done),
                tls: between(marks.tls_start, marks.tls_done),
                request_send: between(marks.got_connection, marks.wrote_request),
                server_processing: between(sent, marks.first_response_byte),
                content_transfer: between(marks.first_response_byte, marks.done),
                total: between(marks.start, marks.done),
            }
        })
    }
}
