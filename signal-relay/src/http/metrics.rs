//! Prometheus metrics endpoint.

use crate::server::SignalRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<SignalRelay>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&relay).await,
    )
}

async fn render(relay: &SignalRelay) -> String {
    let m = relay.metrics();

    // Gauges
    let sessions = relay.total_sessions();
    let pending_identities = relay.pending_identities();
    let pending_messages = relay.pending_messages();
    let uptime = relay.uptime().as_secs();
    let signal_keys = relay.rate_limits().signal_keys_count();
    let connection_keys = relay.rate_limits().connection_keys_count();
    // best effort; a failing directory reports zero
    let directory_records = relay.directory().count().await.unwrap_or(0);

    // Counters
    let signals = m.signals_total.load(Ordering::Relaxed);
    let delivered = m.signals_delivered.load(Ordering::Relaxed);
    let queued = m.signals_queued.load(Ordering::Relaxed);
    let dropped = m.signals_dropped.load(Ordering::Relaxed);
    let flushed = m.queued_flushed.load(Ordering::Relaxed);
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let registrations = m.registrations_total.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);
    let validation = m.validation_errors.load(Ordering::Relaxed);

    format!(
        r#"# HELP signal_relay_sessions_active Number of open signaling channels
# TYPE signal_relay_sessions_active gauge
signal_relay_sessions_active {sessions}

# HELP signal_relay_pending_identities Identities with queued messages
# TYPE signal_relay_pending_identities gauge
signal_relay_pending_identities {pending_identities}

# HELP signal_relay_pending_messages Messages queued for offline recipients
# TYPE signal_relay_pending_messages gauge
signal_relay_pending_messages {pending_messages}

# HELP signal_relay_directory_records Registered identities
# TYPE signal_relay_directory_records gauge
signal_relay_directory_records {directory_records}

# HELP signal_relay_uptime_seconds Seconds since startup
# TYPE signal_relay_uptime_seconds gauge
signal_relay_uptime_seconds {uptime}

# HELP signal_relay_rate_limit_keys Identities tracked by the rate limiters
# TYPE signal_relay_rate_limit_keys gauge
signal_relay_rate_limit_keys{{limiter="signal"}} {signal_keys}
signal_relay_rate_limit_keys{{limiter="connection"}} {connection_keys}

# HELP signal_relay_info Server information
# TYPE signal_relay_info gauge
signal_relay_info{{version="{version}"}} 1

# HELP signal_relay_signals_total Signaling messages accepted
# TYPE signal_relay_signals_total counter
signal_relay_signals_total {signals}

# HELP signal_relay_signals_delivered_total Messages sent live
# TYPE signal_relay_signals_delivered_total counter
signal_relay_signals_delivered_total {delivered}

# HELP signal_relay_signals_queued_total Messages held for offline recipients
# TYPE signal_relay_signals_queued_total counter
signal_relay_signals_queued_total {queued}

# HELP signal_relay_signals_dropped_total Messages dropped (failed send, offline ICE, eviction)
# TYPE signal_relay_signals_dropped_total counter
signal_relay_signals_dropped_total {dropped}

# HELP signal_relay_queued_flushed_total Queued messages handed over on connect
# TYPE signal_relay_queued_flushed_total counter
signal_relay_queued_flushed_total {flushed}

# HELP signal_relay_connections_total Total channels opened
# TYPE signal_relay_connections_total counter
signal_relay_connections_total {conns_total}

# HELP signal_relay_registrations_total Successful registrations
# TYPE signal_relay_registrations_total counter
signal_relay_registrations_total {registrations}

# HELP signal_relay_rate_limit_hits_total Rate limit and capacity rejections
# TYPE signal_relay_rate_limit_hits_total counter
signal_relay_rate_limit_hits_total {rate_limits}

# HELP signal_relay_validation_errors_total Requests rejected for missing or malformed input
# TYPE signal_relay_validation_errors_total counter
signal_relay_validation_errors_total {validation}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}
