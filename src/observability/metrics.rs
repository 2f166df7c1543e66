//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): inbound requests by method, status, upstream
//! - `lb_request_duration_seconds` (histogram): end-to-end latency including retries
//! - `lb_upstream_attempt_failures_total` (counter): failed forward attempts by kind
//! - `lb_upstream_eligible` (gauge): 1=eligible, 0=cooling
//! - `lb_health_probes_total` (counter): probe outcomes per upstream
//!
//! Recording is a no-op until a recorder is installed by [`init_metrics`].

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, upstream: &str, start: Instant) {
    counter!(
        "lb_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "upstream" => upstream.to_string()
    )
    .increment(1);
    histogram!("lb_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt_failure(upstream: &str, kind: &'static str) {
    counter!(
        "lb_upstream_attempt_failures_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_upstream_eligible(upstream: &str, eligible: bool) {
    gauge!("lb_upstream_eligible", "upstream" => upstream.to_string())
        .set(if eligible { 1.0 } else { 0.0 });
}

pub fn record_health_probe(upstream: &str, healthy: bool) {
    counter!(
        "lb_health_probes_total",
        "upstream" => upstream.to_string(),
        "result" => if healthy { "healthy" } else { "unhealthy" }
    )
    .increment(1);
}
