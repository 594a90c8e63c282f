//! Typed configuration for the routerhttp embedded server.
//!
//! - TOML and JSON configuration files
//! - `.env` files and environment variable overrides
//! - Strict parsing (unknown fields are errors)
//! - Layered loading (defaults → file → env → validation)
//!
//! # Example
//!
//! ```no_run
//! use routerhttp_config::ConfigLoader;
//! use routerhttp_router::RouteRegistry;
//!
//! # fn main() -> Result<(), routerhttp_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("routerhttp.toml")?
//!     .with_env_prefix("ROUTERHTTP")
//!     .load()?;
//!
//! let mut routes = RouteRegistry::new();
//! config.apply_mounts(&mut routes)?;
//! let server_config = config.server_config();
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! websocket_host = "0.0.0.0"
//! header_timeout_ms = 10000
//!
//! [websocket]
//! max_connections = 100
//! reap_interval_ms = 1000
//! handshake_timeout_ms = 5000
//! keepalive_ping = false
//! max_message_size = 65536
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//!
//! [[mounts]]
//! prefix = "/static"
//! directory = "./public"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Scalar values can be overridden with `PREFIX__SECTION__KEY`, for example
//! `ROUTERHTTP__WEBSOCKET__MAX_CONNECTIONS=50`. Mounts are file-only.

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::RouterHttpConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::{LoggingSection, MetricsSection, MountSection, ServerSection, WebSocketSection};
