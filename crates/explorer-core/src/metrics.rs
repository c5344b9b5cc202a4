//! Sync engine metrics.
//!
//! Recording goes through the `metrics` facade, so every call is a cheap atomic update and a
//! no-op until a recorder is installed. The server installs the Prometheus exporter with
//! [`install_prometheus_exporter`] when `metrics.enabled` is set.
//!
//! | Metric                          | Kind    | Labels   |
//! |---------------------------------|---------|----------|
//! | `explorer_blocks_ingested_total`| counter | `mode`   |
//! | `explorer_reorg_repairs_total`  | counter | `mode`   |
//! | `explorer_tick_failures_total`  | counter | `worker` |
//! | `explorer_broadcasts_total`     | counter |          |
//! | `explorer_synced_height`        | gauge   |          |
//! | `explorer_node_height`          | gauge   |          |

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::{Ipv4Addr, SocketAddr};

/// Handle used by workers to record engine metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn record_block_ingested(&self, mode: &'static str, height: u64) {
        counter!("explorer_blocks_ingested_total", "mode" => mode).increment(1);
        #[allow(clippy::cast_precision_loss)]
        gauge!("explorer_synced_height").set(height as f64);
    }

    pub fn record_reorg_repair(&self, mode: &'static str) {
        counter!("explorer_reorg_repairs_total", "mode" => mode).increment(1);
    }

    pub fn record_tick_failure(&self, worker: &'static str) {
        counter!("explorer_tick_failures_total", "worker" => worker).increment(1);
    }

    pub fn record_broadcast(&self) {
        counter!("explorer_broadcasts_total").increment(1);
    }

    pub fn record_node_height(&self, height: u64) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("explorer_node_height").set(height as f64);
    }
}

/// Installs the global Prometheus recorder with an HTTP listener on `0.0.0.0:port`.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener cannot bind.
pub fn install_prometheus_exporter(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(port = port, "prometheus exporter listening");
    Ok(())
}
