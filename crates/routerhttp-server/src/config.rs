//! Server configuration types.
//!
//! Configuration is built with [`ServerConfig::builder()`].
//!
//! # Example
//!
//! ```rust
//! use routerhttp_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_addr("127.0.0.1:8080")
//!     .max_connections(16)
//!     .header_timeout(Some(Duration::from_secs(10)))
//!     .build();
//!
//! assert_eq!(config.http_addr(), "127.0.0.1:8080");
//! assert_eq!(config.registry().max_connections, 16);
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use routerhttp_ws::{RegistryConfig, WebSocketConfig};

use crate::error::{ServerError, ServerResult};

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Default host WebSocket listeners bind to.
pub const DEFAULT_WEBSOCKET_HOST: &str = "0.0.0.0";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP bind address (e.g., "0.0.0.0:8080")
    http_addr: String,

    /// Host every WebSocket port is bound on
    websocket_host: String,

    /// Deadline for reading the request head (None = wait forever)
    header_timeout: Option<Duration>,

    /// Per-connection WebSocket settings
    websocket: WebSocketConfig,

    /// Admission control and reaper settings
    registry: RegistryConfig,
}

impl ServerConfig {
    /// Creates a new server configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Returns the HTTP bind address.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Parses the HTTP bind address.
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        self.http_addr
            .parse()
            .map_err(|e| ServerError::invalid_address(&self.http_addr, e))
    }

    /// Returns the WebSocket bind host.
    #[must_use]
    pub fn websocket_host(&self) -> &str {
        &self.websocket_host
    }

    /// Address a WebSocket listener on `port` binds to.
    pub fn websocket_addr(&self, port: u16) -> ServerResult<SocketAddr> {
        let ip: IpAddr = self
            .websocket_host
            .parse()
            .map_err(|e| ServerError::invalid_address(&self.websocket_host, e))?;
        Ok(SocketAddr::new(ip, port))
    }

    /// Returns the request head timeout, if configured.
    #[must_use]
    pub fn header_timeout(&self) -> Option<Duration> {
        self.header_timeout
    }

    /// Returns the per-connection WebSocket settings.
    #[must_use]
    pub fn websocket(&self) -> &WebSocketConfig {
        &self.websocket
    }

    /// Returns the connection registry settings.
    #[must_use]
    pub fn registry(&self) -> &RegistryConfig {
        &self.registry
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    http_addr: String,
    websocket_host: String,
    header_timeout: Option<Duration>,
    websocket: WebSocketConfig,
    registry: RegistryConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            websocket_host: DEFAULT_WEBSOCKET_HOST.to_string(),
            header_timeout: None,
            websocket: WebSocketConfig::default(),
            registry: RegistryConfig::default(),
        }
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Sets the host WebSocket listeners bind to.
    #[must_use]
    pub fn websocket_host(mut self, host: impl Into<String>) -> Self {
        self.websocket_host = host.into();
        self
    }

    /// Sets the request head timeout.
    ///
    /// A client that has not finished its header block in time is
    /// disconnected without a response.
    #[must_use]
    pub fn header_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.header_timeout = timeout;
        self
    }

    /// Sets the WebSocket connection ceiling (zero or negative = unlimited).
    #[must_use]
    pub fn max_connections(mut self, max: isize) -> Self {
        self.registry.max_connections = max;
        self
    }

    /// Sets the reaper interval.
    #[must_use]
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.registry.reap_interval = interval;
        self
    }

    /// Enables or disables the keep-alive ping on each sweep.
    #[must_use]
    pub fn keepalive_ping(mut self, enabled: bool) -> Self {
        self.registry.keepalive_ping = enabled;
        self
    }

    /// Sets the WebSocket handshake timeout.
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.websocket.handshake_timeout = timeout;
        self
    }

    /// Sets the largest accepted WebSocket frame.
    #[must_use]
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.websocket.max_message_size = size;
        self
    }

    /// Builds the [`ServerConfig`] with the configured values.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            http_addr: self.http_addr,
            websocket_host: self.websocket_host,
            header_timeout: self.header_timeout,
            websocket: self.websocket,
            registry: self.registry,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
