//! Top-level configuration type.
//!
//! [`RouterHttpConfig`] is the deserialized file; the conversion methods
//! produce the runtime settings of the server and telemetry crates.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use routerhttp_router::RouteRegistry;
use routerhttp_server::ServerConfig;
use routerhttp_telemetry::{LogConfig, LogFormat, MetricsConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LoggingSection, MetricsSection, MountSection, ServerSection, WebSocketSection};

/// Complete routerhttp configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use routerhttp_config::RouterHttpConfig;
///
/// let config = RouterHttpConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.websocket.max_connections, -1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct RouterHttpConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// WebSocket settings.
    #[serde(default)]
    pub websocket: WebSocketSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics exporter settings.
    #[serde(default)]
    pub metrics: MetricsSection,

    /// Static mounts, in match order.
    #[serde(default)]
    pub mounts: Vec<MountSection>,
}

impl RouterHttpConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.websocket_host.parse::<IpAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.websocket_host",
                format!("invalid IP address: {}", self.server.websocket_host),
            ));
        }

        if self.websocket.reap_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "websocket.reap_interval_ms",
                "must be greater than zero",
            ));
        }

        if self.websocket.max_message_size == 0 {
            return Err(ConfigError::invalid_value(
                "websocket.max_message_size",
                "must be greater than zero",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }

        if self.metrics.enabled && self.metrics.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs.
    ///
    /// # Example
    ///
    /// ```
    /// use routerhttp_config::RouterHttpConfig;
    ///
    /// let config = RouterHttpConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config
    }

    /// Runtime server settings.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .http_addr(self.server.http_addr.clone())
            .websocket_host(self.server.websocket_host.clone())
            .header_timeout(self.server.header_timeout_ms.map(Duration::from_millis))
            .max_connections(self.websocket.max_connections)
            .reap_interval(Duration::from_millis(self.websocket.reap_interval_ms))
            .keepalive_ping(self.websocket.keepalive_ping)
            .handshake_timeout(self.websocket.handshake_timeout_ms.map(Duration::from_millis))
            .max_message_size(self.websocket.max_message_size)
            .build()
    }

    /// Logging settings for [`routerhttp_telemetry::init_logging`].
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.logging.enabled,
            level: self.logging.level.clone(),
            format: self.logging.format,
            ..LogConfig::default()
        }
    }

    /// Metrics settings for [`routerhttp_telemetry::init_metrics`].
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.metrics.enabled,
            addr: self.metrics.addr.clone(),
        }
    }

    /// Registers every configured static mount on `registry`.
    ///
    /// # Errors
    ///
    /// Fails on the first mount whose directory does not exist.
    pub fn apply_mounts(&self, registry: &mut RouteRegistry) -> ConfigResult<()> {
        for (index, mount) in self.mounts.iter().enumerate() {
            registry
                .mount(&mount.directory, &mount.prefix)
                .map_err(|e| ConfigError::invalid_value(format!("mounts[{index}].directory"), e.to_string()))?;
        }
        Ok(())
    }
}
