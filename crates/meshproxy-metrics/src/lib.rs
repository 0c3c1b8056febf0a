//! Metrics collection and Prometheus exporter for meshproxy.
//!
//! Counts accepted local connections, relay dials, session reconnects,
//! stream-open failures and spliced bytes.

use std::io;
use std::net::SocketAddr;

use meshproxy_core::io::{Direction, SpliceObserver};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Total number of local connections accepted.
pub const CONNECTIONS_TOTAL: &str = "meshproxy_connections_total";
/// Number of currently piped local connections.
pub const CONNECTIONS_ACTIVE: &str = "meshproxy_connections_active";
/// Local connections dropped because no stream could be opened.
pub const CONNECTIONS_DROPPED_TOTAL: &str = "meshproxy_connections_dropped_total";
/// Connection duration histogram (seconds).
pub const CONNECTION_DURATION_SECONDS: &str = "meshproxy_connection_duration_seconds";
/// Relay dial attempts by result ("ok" or "failed").
pub const DIALS_TOTAL: &str = "meshproxy_dials_total";
/// Sessions created, labelled by whether the reconnect was forced.
pub const SESSIONS_CREATED_TOTAL: &str = "meshproxy_sessions_created_total";
/// Logical streams opened successfully.
pub const STREAMS_OPENED_TOTAL: &str = "meshproxy_streams_opened_total";
/// Total bytes spliced, by direction.
pub const SPLICE_BYTES_TOTAL: &str = "meshproxy_splice_bytes_total";
/// Total number of errors by type.
pub const ERRORS_TOTAL: &str = "meshproxy_errors_total";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a new local connection accepted.
#[inline]
pub fn record_connection_accepted() {
    counter!(CONNECTIONS_TOTAL).increment(1);
}

/// Record a local connection that started piping.
#[inline]
pub fn record_connection_piped() {
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a piped connection closed.
#[inline]
pub fn record_connection_closed(duration_secs: f64) {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(CONNECTION_DURATION_SECONDS).record(duration_secs);
}

/// Record a local connection dropped before piping.
#[inline]
pub fn record_connection_dropped() {
    counter!(CONNECTIONS_DROPPED_TOTAL).increment(1);
}

/// Record a relay dial attempt.
#[inline]
pub fn record_dial(ok: bool) {
    let result = if ok { "ok" } else { "failed" };
    counter!(DIALS_TOTAL, "result" => result).increment(1);
}

/// Record a new multiplexed session.
#[inline]
pub fn record_session_created(forced: bool) {
    let kind = if forced { "forced" } else { "lazy" };
    counter!(SESSIONS_CREATED_TOTAL, "kind" => kind).increment(1);
}

/// Record a logical stream opened.
#[inline]
pub fn record_stream_opened() {
    counter!(STREAMS_OPENED_TOTAL).increment(1);
}

/// Record spliced bytes (direction: "upstream" or "downstream").
#[inline]
pub fn record_splice_bytes(direction: &'static str, bytes: u64) {
    counter!(SPLICE_BYTES_TOTAL, "direction" => direction).increment(bytes);
}

/// Record an error by type.
#[inline]
pub fn record_error(error_type: &'static str) {
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Splice observer that records to the global metrics recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl SpliceObserver for MetricsObserver {
    #[inline]
    fn record_bytes(&self, direction: Direction, bytes: u64) {
        record_splice_bytes(direction.as_str(), bytes);
    }

    #[inline]
    fn record_error(&self, _direction: Direction, _error: &io::Error) {
        record_error(ERROR_SPLICE);
    }
}

// ============================================================================
// Error Type Constants (re-exported from meshproxy-core)
// ============================================================================

pub use meshproxy_core::{
    ERROR_ACCEPT, ERROR_DIAL, ERROR_DIRECTORY, ERROR_SESSION, ERROR_SPLICE, ERROR_STREAM_OPEN,
};
