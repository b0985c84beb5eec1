//! Background cleanup task.
//!
//! Runs periodically to drop expired queued signaling, reap directory
//! records that went stale while offline, and shrink the rate limiter maps.

use crate::config::CleanupConfig;
use crate::error::DirectoryError;
use crate::server::SignalRelay;
use signal_types::{Identity, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// What one cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Queued messages past their TTL.
    pub expired_messages: usize,
    /// Directory records past the staleness cutoff.
    pub reaped_records: u64,
}

/// Run a single cleanup pass.
pub async fn run_once(relay: &SignalRelay) -> Result<CleanupReport, DirectoryError> {
    let expired_messages = relay.engine().pending().reap_expired();

    let reaped_records = match relay.config().directory.stale_after() {
        Some(age) => {
            let cutoff = Timestamp::now().saturating_sub(age);
            let sessions = relay.engine().sessions();
            relay
                .directory()
                .reap_stale(cutoff, &|identity: &Identity| sessions.is_online(identity))
                .await?
        }
        None => 0,
    };

    relay.rate_limits().shrink();

    Ok(CleanupReport {
        expired_messages,
        reaped_records,
    })
}

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(
    relay: Arc<SignalRelay>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Cleanup task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;

            match run_once(&relay).await {
                Ok(report) if report != CleanupReport::default() => {
                    tracing::info!(
                        "Cleanup: dropped {} expired messages, reaped {} stale records",
                        report.expired_messages,
                        report.reaped_records
                    );
                }
                Ok(_) => tracing::debug!("Cleanup: nothing to do"),
                Err(e) => tracing::error!("Cleanup error: {}", e),
            }
        }
    })
}
