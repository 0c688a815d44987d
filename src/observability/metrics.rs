//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_host_requests_total` (counter): routing decisions by outcome
//! - `http_host_serve_restarts_total` (counter): retried serve failures
//! - `http_host_mounts` (gauge): number of live mount entries

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_route(outcome: &'static str) {
    metrics::counter!("http_host_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_serve_restart() {
    metrics::counter!("http_host_serve_restarts_total").increment(1);
}

pub fn set_mount_count(count: usize) {
    metrics::gauge!("http_host_mounts").set(count as f64);
}
