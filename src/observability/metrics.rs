//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by status and cache outcome
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_rate_limited_total` (counter): denials by reason
//! - `proxy_upstream_failures_total` (counter): fetch failures by kind
//! - `proxy_cache_entries` (gauge): current cache entry count
//! - `proxy_rate_limit_clients` (gauge): tracked client keys
//!
//! Recording helpers are cheap no-ops until an exporter is installed, so
//! call sites never need to check whether metrics are enabled.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics exporter");
        }
    }
}

/// Record one finished request.
pub fn record_request(status: u16, cache_status: &str, started: Instant) {
    counter!(
        "proxy_requests_total",
        "status" => status.to_string(),
        "cache" => cache_status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Record a rate-limit denial.
pub fn record_rate_limited(reason: &'static str) {
    counter!("proxy_rate_limited_total", "reason" => reason).increment(1);
}

/// Record an upstream fetch failure by error kind.
pub fn record_upstream_failure(kind: &'static str) {
    counter!("proxy_upstream_failures_total", "kind" => kind).increment(1);
}

/// Update the cache entry gauge.
pub fn record_cache_size(entries: usize) {
    gauge!("proxy_cache_entries").set(entries as f64);
}

/// Update the tracked-clients gauge.
pub fn record_tracked_clients(clients: usize) {
    gauge!("proxy_rate_limit_clients").set(clients as f64);
}
