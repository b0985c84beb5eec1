//! Main SignalRelay server coordination.
//!
//! SignalRelay owns the relay engine, the identity directory, rate limits and
//! metrics, and exposes the operations the HTTP layer calls.

use crate::config::Config;
use crate::directory::{Directory, MemoryDirectory};
use crate::error::{RequestError, RequestResult};
use crate::limits::RateLimits;
use crate::pending::PendingQueue;
use crate::relay::{RelayEngine, RouteOutcome};
use signal_types::api::{Presence, RegisterRequest, SignalRequest, UserProfile};
use signal_types::{Identity, SignalKind, SignalingMessage, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Signaling requests that passed validation and rate limits.
    pub signals_total: AtomicU64,
    /// Messages sent live on a recipient's channel.
    pub signals_delivered: AtomicU64,
    /// Messages held for an offline recipient.
    pub signals_queued: AtomicU64,
    /// Messages dropped (failed send, offline ICE, queue eviction).
    pub signals_dropped: AtomicU64,
    /// Queued messages handed to a channel on bind.
    pub queued_flushed: AtomicU64,
    /// Channels opened.
    pub connections_total: AtomicU64,
    /// Successful registrations.
    pub registrations_total: AtomicU64,
    /// Rate limit and capacity rejections.
    pub rate_limit_hits: AtomicU64,
    /// Requests rejected for missing or malformed input.
    pub validation_errors: AtomicU64,
}

/// Main relay server.
pub struct SignalRelay {
    config: Config,
    engine: RelayEngine,
    directory: Arc<dyn Directory>,
    /// Rate limiters for signaling and channel opens.
    rate_limits: RateLimits,
    /// Operational metrics (counters).
    metrics: RelayMetrics,
    started_at: Instant,
}

impl std::fmt::Debug for SignalRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRelay")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("sessions_count", &self.engine.sessions().len())
            .finish_non_exhaustive()
    }
}

impl SignalRelay {
    /// Create a new SignalRelay with the given config and directory.
    pub fn new(config: Config, directory: Arc<dyn Directory>) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        let pending = PendingQueue::with_limits(config.queue.capacity(), config.queue.ttl());
        Self {
            config,
            engine: RelayEngine::new(pending),
            directory,
            rate_limits,
            metrics: RelayMetrics::default(),
            started_at: Instant::now(),
        }
    }

    /// Create a relay backed by an in-memory directory.
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, Arc::new(MemoryDirectory::new()))
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the relay engine (session registry and pending queue).
    pub fn engine(&self) -> &RelayEngine {
        &self.engine
    }

    /// Get the identity directory.
    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Time since the relay was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check a presented shared secret.
    ///
    /// Fails with [`RequestError::Misconfigured`] when no secret is
    /// configured, whatever was presented.
    pub fn authorize(&self, presented: Option<&str>) -> RequestResult<()> {
        let expected = match self.config.auth.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(RequestError::Misconfigured),
        };
        match presented {
            Some(key) if bool::from(key.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
            _ => Err(RequestError::Unauthorized),
        }
    }

    /// Register (or re-register) a user in the directory.
    pub async fn register_user(&self, request: RegisterRequest) -> RequestResult<Identity> {
        let profile = request
            .into_profile(Timestamp::now())
            .map_err(|e| self.validation_failed(e))?;
        let identity = profile.user_id.clone();
        self.directory.upsert(profile).await?;

        self.metrics.registrations_total.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Registered {}", identity);
        Ok(identity)
    }

    /// Fetch a user's directory record.
    pub async fn lookup_user(&self, identity: &Identity) -> RequestResult<UserProfile> {
        self.directory
            .get(identity)
            .await?
            .ok_or_else(|| RequestError::NotFound {
                identity: identity.to_string(),
            })
    }

    /// Validate a signaling request body and relay it.
    pub fn send_signal(
        &self,
        kind: SignalKind,
        request: SignalRequest,
    ) -> RequestResult<RouteOutcome> {
        let message = request
            .into_message(kind)
            .map_err(|e| self.validation_failed(e))?;
        self.relay(message)
    }

    /// Relay an already-built message.
    ///
    /// Errors only on oversized payloads or rate limits; an offline or
    /// unreachable recipient is a normal outcome, not an error.
    pub fn relay(&self, message: SignalingMessage) -> RequestResult<RouteOutcome> {
        message
            .check_size(self.config.limits.max_payload_bytes)
            .map_err(|e| self.validation_failed(e))?;

        if let Err(e) = self
            .rate_limits
            .check_global()
            .and_then(|()| self.rate_limits.check_signal(message.from()))
        {
            tracing::warn!("Signal from {} rate limited: {}", message.from(), e);
            self.metrics.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
            return Err(e.into());
        }

        self.metrics.signals_total.fetch_add(1, Ordering::Relaxed);
        let outcome = self.engine.route(message);
        let counter = match &outcome {
            RouteOutcome::Delivered => &self.metrics.signals_delivered,
            RouteOutcome::Queued { evicted, .. } => {
                if *evicted {
                    self.metrics.signals_dropped.fetch_add(1, Ordering::Relaxed);
                }
                &self.metrics.signals_queued
            }
            RouteOutcome::Dropped(_) => &self.metrics.signals_dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(outcome)
    }

    /// Presence for an identity: registry liveness plus directory last-seen.
    ///
    /// Unregistered identities report `lastSeen: null` rather than failing.
    pub async fn presence(&self, identity: &Identity) -> RequestResult<Presence> {
        let online = self.engine.sessions().is_online(identity);
        let last_seen = self.directory.get(identity).await?.map(|p| p.last_seen);
        Ok(Presence { online, last_seen })
    }

    /// Gate a channel open on rate limits and session capacity.
    pub fn admit_connection(&self, identity: &Identity) -> RequestResult<()> {
        self.check_capacity(identity)?;
        if let Err(e) = self.rate_limits.check_connection(identity) {
            tracing::warn!("Connection rate limited for {}: {}", identity, e);
            self.metrics.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
            return Err(e.into());
        }
        Ok(())
    }

    /// Fail with [`RequestError::AtCapacity`] if binding `identity` would
    /// add a session beyond `max_concurrent_sessions`.
    ///
    /// An identity that is already online only replaces its own session, so
    /// it always fits. The check is not atomic with the bind that follows;
    /// concurrent opens can overshoot the limit by the number of racing
    /// connections.
    pub fn check_capacity(&self, identity: &Identity) -> RequestResult<()> {
        let limit = self.config.limits.max_concurrent_sessions;
        if self.total_sessions() >= limit && !self.engine.sessions().is_online(identity) {
            tracing::warn!("Session limit reached ({}), rejecting {}", limit, identity);
            self.metrics.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
            return Err(RequestError::AtCapacity { limit });
        }
        Ok(())
    }

    /// Reject a request body that could not be decoded.
    pub fn malformed_body(&self, detail: String) -> RequestError {
        self.metrics.validation_errors.fetch_add(1, Ordering::Relaxed);
        RequestError::MalformedBody(detail)
    }

    /// Get total live sessions.
    pub fn total_sessions(&self) -> usize {
        self.engine.sessions().len()
    }

    /// Identities with queued messages.
    pub fn pending_identities(&self) -> usize {
        self.engine.pending().identities()
    }

    /// Total queued messages.
    pub fn pending_messages(&self) -> usize {
        self.engine.pending().total_messages()
    }

    fn validation_failed(&self, e: signal_types::SignalError) -> RequestError {
        self.metrics.validation_errors.fetch_add(1, Ordering::Relaxed);
        RequestError::Validation(e)
    }
}
