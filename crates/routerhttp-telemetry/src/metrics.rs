//! Prometheus metrics.
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op. [`init_metrics`] installs a Prometheus
//! recorder and serves the scrape endpoint on the configured address.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `routerhttp_http_requests_total` | Counter | `method`, `status` | HTTP responses written |
//! | `routerhttp_ws_connections_active` | Gauge | - | Registered WebSocket connections |
//! | `routerhttp_ws_connections_total` | Counter | - | WebSocket connections opened |
//! | `routerhttp_ws_rejected_total` | Counter | - | Handshakes refused by admission control |
//! | `routerhttp_ws_reaped_total` | Counter | - | Connections evicted by the reaper |

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Counter of HTTP responses, labelled by method and status.
pub const HTTP_REQUESTS_TOTAL: &str = "routerhttp_http_requests_total";
/// Gauge of registered WebSocket connections.
pub const WS_CONNECTIONS_ACTIVE: &str = "routerhttp_ws_connections_active";
/// Counter of WebSocket connections opened.
pub const WS_CONNECTIONS_TOTAL: &str = "routerhttp_ws_connections_total";
/// Counter of handshakes refused by admission control.
pub const WS_REJECTED_TOTAL: &str = "routerhttp_ws_rejected_total";
/// Counter of connections evicted by the reaping sweep.
pub const WS_REAPED_TOTAL: &str = "routerhttp_ws_reaped_total";

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the Prometheus exporter is installed.
    pub enabled: bool,

    /// Address to expose metrics on (e.g., "0.0.0.0:9090").
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and spawns the scrape endpoint.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let _ = METRICS_HANDLE.set(handle);

    tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "Metrics exporter stopped");
        }
    });

    register_metric_descriptions();
    tracing::info!(%addr, "Metrics endpoint listening");

    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers descriptions for all standard metrics.
pub fn register_metric_descriptions() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP responses written");
    describe_gauge!(
        WS_CONNECTIONS_ACTIVE,
        "Number of WebSocket connections currently registered"
    );
    describe_counter!(WS_CONNECTIONS_TOTAL, "Total WebSocket connections opened");
    describe_counter!(
        WS_REJECTED_TOTAL,
        "Total WebSocket handshakes refused by admission control"
    );
    describe_counter!(
        WS_REAPED_TOTAL,
        "Total WebSocket connections evicted by the reaping sweep"
    );
}

/// Records a written HTTP response.
pub fn record_http_request(method: &str, status_code: u16) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);
}

/// Records an opened WebSocket connection.
pub fn record_ws_accepted() {
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
}

/// Records a handshake refused by admission control.
pub fn record_ws_rejected() {
    counter!(WS_REJECTED_TOTAL).increment(1);
}

/// Records connections evicted by one sweep.
pub fn record_ws_reaped(count: usize) {
    counter!(WS_REAPED_TOTAL).increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Sets the active connection gauge.
pub fn set_ws_active(count: usize) {
    gauge!(WS_CONNECTIONS_ACTIVE).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.addr, "0.0.0.0:9090");
    }

    #[test]
    fn test_disabled_is_noop() {
        assert!(init_metrics(&MetricsConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            enabled: true,
            addr: "not an address".to_string(),
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_record_functions_dont_panic() {
        record_http_request("GET", 200);
        record_ws_accepted();
        record_ws_rejected();
        record_ws_reaped(3);
        set_ws_active(1);
    }

    #[test]
    fn test_recorded_values_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_http_request("GET", 404);
            record_ws_reaped(2);
            set_ws_active(5);
        });

        let rendered = handle.render();
        assert!(rendered.contains(HTTP_REQUESTS_TOTAL));
        assert!(rendered.contains("method=\"GET\""));
        assert!(rendered.contains("status=\"404\""));
        assert!(rendered.contains("routerhttp_ws_reaped_total 2"));
        assert!(rendered.contains("routerhttp_ws_connections_active 5"));
    }
}
