//! Metrics collection and exposition.
//!
//! # Metrics
//! - `client_requests_total` (counter): inbound requests by status
//! - `client_request_duration_seconds` (histogram): inbound latency
//! - `upstream_attempts_total` (counter): upstream attempts by outcome
//! - `upstream_retries_total` (counter): backoff sleeps taken
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `circuit_breaker_transitions_total` (counter): transitions by target state
//! - `circuit_breaker_rejections_total` (counter): fast-failed requests
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so unit tests need no setup

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("client_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("client_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_attempt(outcome: &'static str) {
    metrics::counter!("upstream_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_retry() {
    metrics::counter!("upstream_retries_total").increment(1);
}

pub fn record_breaker_state(state: CircuitState) {
    metrics::gauge!("circuit_breaker_state").set(state.as_metric_value());
}

pub fn record_breaker_transition(to: CircuitState) {
    metrics::counter!("circuit_breaker_transitions_total", "to" => to.as_str()).increment(1);
    record_breaker_state(to);
}

pub fn record_breaker_rejection() {
    metrics::counter!("circuit_breaker_rejections_total").increment(1);
}
