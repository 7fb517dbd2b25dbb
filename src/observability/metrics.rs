//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_calls_total` (counter): executed calls by breaker, outcome
//! - `breaker_rejections_total` (counter): short-circuited calls by breaker
//! - `breaker_transitions_total` (counter): state changes by breaker, target state
//! - `breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `breaker_health` (gauge): 0=healthy, 1=degraded, 2=unhealthy
//! - `breaker_store_errors_total` (counter): failed store operations by op
//!
//! All recorders are no-ops until an exporter is installed.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::health::HealthStatus;
use crate::resilience::state::CircuitState;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record an executed call: `success`, `failure`, `timeout`, `cancelled` or `ignored_error`.
pub fn record_call(breaker: &str, outcome: &'static str) {
    counter!("breaker_calls_total", "breaker" => breaker.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_rejection(breaker: &str) {
    counter!("breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_transition(breaker: &str, to: CircuitState) {
    counter!(
        "breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(breaker, to);
}

pub fn record_state(breaker: &str, state: CircuitState) {
    gauge!("breaker_state", "breaker" => breaker.to_string()).set(state.as_gauge());
}

pub fn record_health(breaker: &str, status: HealthStatus) {
    gauge!("breaker_health", "breaker" => breaker.to_string()).set(status.as_gauge());
}

/// Record a failed store operation (`load` or `save`).
pub fn record_store_error(op: &'static str) {
    counter!("breaker_store_errors_total", "op" => op).increment(1);
}
