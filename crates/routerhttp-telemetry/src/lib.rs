//! Observability for the routerhttp embedded server.
//!
//! - **Logging**: structured `tracing` output, JSON or pretty, filtered by an `EnvFilter`
//! - **Metrics**: counters and gauges through the `metrics` facade, with an
//!   optional Prometheus scrape endpoint
//!
//! # Example
//!
//! ```rust,ignore
//! use routerhttp_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     init_telemetry(&TelemetryConfig::default()).expect("Failed to init telemetry");
//!     // Telemetry is now active...
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if any subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
