//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use relay::prelude::*;
//! ```

pub use crate::{
    Adapter, Body, BoxError, Config, Context, Error, ErrorCategory, ErrorKind, Form, HttpClient,
    HyperClient, Instance, InstanceConfig, Method, Request, RequestInterceptor, Response,
    ResponseInterceptor, Result, StatusCode, Stats, Values, header,
};
pub use serde::{Deserialize, Serialize};
