//! Health check endpoint.

use crate::server::SignalRelay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of open channels.
    pub sessions: usize,
    /// Identities with queued messages.
    pub pending_identities: usize,
    /// Total queued messages.
    pub pending_messages: usize,
    /// Directory records, or `None` if the directory could not be read.
    pub directory_records: Option<usize>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(relay): Extension<Arc<SignalRelay>>) -> Json<HealthStatus> {
    let directory_records = match relay.directory().count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Health check could not count directory records: {}", e);
            None
        }
    };

    let status = if directory_records.is_some() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: relay.total_sessions(),
        pending_identities: relay.pending_identities(),
        pending_messages: relay.pending_messages(),
        directory_records,
        uptime_seconds: relay.uptime().as_secs(),
    })
}
