//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): inbound requests by method, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `esi_side_requests_total` (counter): side-requests by outcome
//! - `esi_side_request_duration_seconds` (histogram)
//! - `esi_resolutions_total` (counter): resolution passes by outcome
//! - `esi_resolution_rounds` (histogram): rounds needed per pass
//! - `strip_session_urls` (gauge): URLs currently marked for cookie stripping
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_side_request(outcome: &'static str, start: Instant) {
    counter!("esi_side_requests_total", "outcome" => outcome).increment(1);
    histogram!("esi_side_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_resolution(outcome: &'static str, rounds: usize) {
    counter!("esi_resolutions_total", "outcome" => outcome).increment(1);
    histogram!("esi_resolution_rounds").record(rounds as f64);
}

pub fn record_strip_session_urls(count: usize) {
    gauge!("strip_session_urls").set(count as f64);
}
