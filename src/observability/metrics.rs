//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tls_gate_connections_total` (counter): finished connections by `outcome`
//! - `tls_gate_responses_total` (counter): responses sent by `response`
//! - `tls_gate_response_write_failures_total` (counter): responses that could not be delivered
//! - `tls_gate_connection_duration_seconds` (histogram): accept to close
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is optional and serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::protocol::Response;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a connection reaching `Closed`.
pub fn record_connection(outcome: &'static str, started: Instant) {
    counter!("tls_gate_connections_total", "outcome" => outcome).increment(1);
    histogram!("tls_gate_connection_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Record a response that was delivered.
pub fn record_response(response: Response) {
    counter!("tls_gate_responses_total", "response" => response.as_str()).increment(1);
}

/// Record a response write that failed.
pub fn record_write_failure(response: Response) {
    counter!("tls_gate_response_write_failures_total", "response" => response.as_str())
        .increment(1);
}
