//! Metrics collection and exposition.
//!
//! # Metrics
//! - `soapwire_connect_attempts_total` (counter): outbound attempts by scheme
//! - `soapwire_exchanges_total` (counter): completed exchanges by role, status
//! - `soapwire_keepalives_total` (counter): interim 100 responses sent
//! - `soapwire_invocations_total` (counter): SOAP invocations by outcome
//!
//! Updates go through the `metrics` facade and are no-ops until a recorder
//! is installed with [`init_metrics`].

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_connect_attempt(secure: bool) {
    let scheme = if secure { "https" } else { "http" };
    ::metrics::counter!("soapwire_connect_attempts_total", "scheme" => scheme).increment(1);
}

/// `role` is `"client"` or `"server"`.
pub fn record_exchange(role: &'static str, status: u16) {
    ::metrics::counter!(
        "soapwire_exchanges_total",
        "role" => role,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_keepalive() {
    ::metrics::counter!("soapwire_keepalives_total").increment(1);
}

/// `outcome` is one of `"completed"`, `"faulted"`, `"abandoned"`.
pub fn record_invocation(outcome: &'static str) {
    ::metrics::counter!("soapwire_invocations_total", "outcome" => outcome).increment(1);
}
