//! Tower middleware layers for the relay transport.
//!
//! Layers wrap [`HyperClient`](crate::HyperClient), below the instance
//! pipeline: they see the wire request after every interceptor ran and the
//! raw response before any response transform.
//!
//! # Example
//!
//! ```no_run
//! use relay::HyperClient;
//! use relay::middleware::LoggingLayer;
//!
//! let client = HyperClient::builder()
//!     .layer(LoggingLayer::new())
//!     .build();
//! ```

mod logging;

pub use logging::{LogLevel, Logging, LoggingLayer};

// Re-export tower types for custom layers
pub use tower::{Layer, Service, ServiceBuilder};
