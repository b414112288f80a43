//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use relay_core::prelude::*;
//! ```

pub use crate::{
    Adapter, Body, BoxError, Config, Context, Error, ErrorCategory, ErrorKind, Form, HttpClient,
    InstanceConfig, Method, Request, RequestInterceptor, Response, ResponseInterceptor, Result,
    Stats, Values,
};
