//! Core types and traits for the relay HTTP request library.
//!
//! This crate holds everything that does not depend on a concrete transport:
//! - [`Config`] and [`InstanceConfig`] - per-call and per-instance configuration
//! - [`Body`], [`Values`] and [`Form`] - request payloads
//! - [`Request`] and [`Response`] - wire request and buffered response
//! - [`Error`], [`ErrorKind`] and [`category`] - error model and classification
//! - [`HttpClient`], [`Adapter`] and the hook traits - extension points
//! - [`Context`] - cancellation and deadlines
//! - [`HttpTrace`] and [`Stats`] - timings and request summaries
//! - [`StatusCode`] - HTTP status codes (re-exported from `http` crate)
//! - [`header`] - HTTP header names (re-exported from `http` crate)

mod body;
mod category;
mod client;
mod config;
mod context;
mod error;
mod hooks;
mod method;
mod multipart;
pub mod prelude;
mod request;
mod response;
mod stats;
mod trace;
mod values;

pub use body::{Body, ContentType, JsonCodec, SerdeJson, from_json, from_value};
pub use category::{ErrorCategory, category};
pub use client::{Adapter, HttpClient};
pub use config::{Config, InstanceConfig, route_of, substitute_params, url_join};
pub use context::Context;
pub use error::{BoxError, Error, ErrorKind, Result};
pub use hooks::{
    OnBeforeNewRequest, OnDone, OnError, RequestInterceptor, ResponseInterceptor,
    TransformRequest, TransformResponse,
};
pub use method::Method;
pub use multipart::{Form, Part};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use stats::{RequestResult, Stats, ceil_to_ms};
pub use trace::{HttpTrace, Timeline, TracePhase};
pub use values::Values;

// Re-export http crate types for status codes and headers
pub use http::{HeaderMap, StatusCode, header};

// Re-export the cancellation primitives used by `Context`
pub use tokio_util::sync::{CancellationToken, DropGuard};
