//! WebSocket configuration.
//!
//! [`WebSocketConfig`] covers the per-connection settings applied by the
//! handshake and the frame transport; [`RegistryConfig`] covers admission
//! control and the reaping sweep.

use std::time::Duration;

/// Configuration for a WebSocket connection.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Largest accepted data frame in bytes (default: 64 KB).
    pub max_message_size: usize,
    /// Deadline for the opening handshake (default: none).
    pub handshake_timeout: Option<Duration>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64 KB
            handshake_timeout: None,
        }
    }
}

impl WebSocketConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum message size.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }
}

/// Configuration for the connection registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum live connections; zero or negative means unlimited (default: -1).
    pub max_connections: isize,
    /// How often the reaper sweeps the registry (default: 1 second).
    pub reap_interval: Duration,
    /// Ping every live connection on each sweep (default: false).
    pub keepalive_ping: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_connections: -1,
            reap_interval: Duration::from_secs(1),
            keepalive_ping: false,
        }
    }
}

impl RegistryConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection ceiling.
    pub fn max_connections(mut self, max: isize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the sweep interval.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Enable or disable the keep-alive ping.
    pub fn keepalive_ping(mut self, enabled: bool) -> Self {
        self.keepalive_ping = enabled;
        self
    }
}
