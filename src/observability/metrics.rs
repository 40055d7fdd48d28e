//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_http_requests_total` (counter): forwarded requests by method, status
//! - `relay_http_request_duration_seconds` (histogram): time to response headers
//! - `relay_ws_sessions_active` (gauge): sessions holding an admission slot
//! - `relay_ws_sessions_total` (counter): finished sessions by close reason
//! - `relay_ws_messages_total` (counter): relayed messages by direction
//! - `relay_ws_pending_overflow_total` (counter): pending-queue overflows by policy
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "relay_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("relay_http_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn session_admitted() {
    gauge!("relay_ws_sessions_active").increment(1.0);
}

pub fn session_released() {
    gauge!("relay_ws_sessions_active").decrement(1.0);
}

pub fn session_closed(reason: &'static str) {
    counter!("relay_ws_sessions_total", "outcome" => reason).increment(1);
}

pub fn message_relayed(direction: &'static str) {
    counter!("relay_ws_messages_total", "direction" => direction).increment(1);
}

pub fn pending_overflow(policy: &'static str) {
    counter!("relay_ws_pending_overflow_total", "policy" => policy).increment(1);
}
