//! Configuration schema types.
//!
//! One struct per section of the configuration file. Every field has a
//! default, so a file only needs to name what it changes.

use std::path::PathBuf;

use routerhttp_telemetry::LogFormat;
use serde::{Deserialize, Serialize};

/// `[server]`: listener addresses and the request head timeout.
///
/// # Example
///
/// ```
/// use routerhttp_config::ServerSection;
///
/// let section = ServerSection::default();
/// assert_eq!(section.http_addr, "0.0.0.0:8080");
/// assert_eq!(section.websocket_host, "0.0.0.0");
/// assert!(section.header_timeout_ms.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// HTTP bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Host every WebSocket port is bound on.
    #[serde(default = "default_websocket_host")]
    pub websocket_host: String,

    /// Deadline for the request head in milliseconds. Absent waits forever.
    #[serde(default)]
    pub header_timeout_ms: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            websocket_host: default_websocket_host(),
            header_timeout_ms: None,
        }
    }
}

fn default_http_addr() -> String {
    routerhttp_server::DEFAULT_HTTP_ADDR.to_string()
}

fn default_websocket_host() -> String {
    routerhttp_server::DEFAULT_WEBSOCKET_HOST.to_string()
}

/// `[websocket]`: admission control, reaper and framing limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WebSocketSection {
    /// Connection ceiling; zero or negative means unlimited.
    #[serde(default = "default_max_connections")]
    pub max_connections: isize,

    /// Reaper interval in milliseconds.
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,

    /// Handshake deadline in milliseconds. Absent waits forever.
    #[serde(default)]
    pub handshake_timeout_ms: Option<u64>,

    /// Ping every live connection on each sweep.
    #[serde(default)]
    pub keepalive_ping: bool,

    /// Largest accepted message in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for WebSocketSection {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            reap_interval_ms: default_reap_interval_ms(),
            handshake_timeout_ms: None,
            keepalive_ping: false,
            max_message_size: default_max_message_size(),
        }
    }
}

const fn default_max_connections() -> isize {
    -1
}

const fn default_reap_interval_ms() -> u64 {
    1000
}

const fn default_max_message_size() -> usize {
    64 * 1024
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or filter directive (e.g., "info", "routerhttp_ws=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[metrics]`: the optional Prometheus scrape endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// One `[[mounts]]` entry: a URL prefix served from a directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MountSection {
    /// URL prefix. Empty uses the directory path itself.
    #[serde(default)]
    pub prefix: String,

    /// Directory the files are read from.
    pub directory: PathBuf,
}
