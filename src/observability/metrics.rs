//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status, operation
//! - `http_request_duration_seconds` (histogram): pipeline latency
//! - `request_validation_failures_total` (counter): by operation
//! - `channel_connections` (gauge): open push connections
//! - `channel_broadcast_sends_total` / `channel_broadcast_dropped_total`
//!   (counters): fan-out attempts and drops by event
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library code
//!   and tests never depend on the exporter
//! - Prometheus exporter is opt-in through configuration

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, operation: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("operation", operation.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_validation_failure(operation: &str) {
    counter!("request_validation_failures_total", "operation" => operation.to_string())
        .increment(1);
}

pub fn record_channel_connections(count: usize) {
    gauge!("channel_connections").set(count as f64);
}

pub fn record_broadcast(event: &str, attempted: usize, dropped: usize) {
    counter!("channel_broadcast_sends_total", "event" => event.to_string())
        .increment(attempted as u64);
    if dropped > 0 {
        counter!("channel_broadcast_dropped_total", "event" => event.to_string())
            .increment(dropped as u64);
    }
}
