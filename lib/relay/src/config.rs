//! Transport configuration.
//!
//! Only connection-level settings live here. Request deadlines come from the
//! request [`Context`](relay_core::Context) and `Config::timeout`.

use std::time::Duration;

/// Settings of the pooled hyper transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Limit on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Idle connections kept per host.
    pub pool_idle_per_host: usize,
    /// How long an idle connection stays in the pool.
    pub pool_idle_timeout: Duration,
    /// Disable Nagle's algorithm on new sockets.
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Start from the defaults.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Chainable edits over a [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Limit on establishing the TCP connection.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Idle connections kept per host; zero disables pooling.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config.pool_idle_per_host = count;
        self
    }

    /// How long an idle connection stays in the pool.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Disable Nagle's algorithm on new sockets.
    #[must_use]
    pub const fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Finish editing.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_starts_from_defaults() {
        assert_eq!(ClientConfig::builder().build(), ClientConfig::default());
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::builder()
            .connect_timeout(Duration::from_millis(500))
            .pool_idle_per_host(0)
            .nodelay(false)
            .build();

        assert_eq!(config.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.pool_idle_per_host, 0);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
        assert!(!config.nodelay);
    }
}
