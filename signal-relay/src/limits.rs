//! Rate limiting for signal-relay.
//!
//! Provides protection against signaling spam and reconnect storms.
//!
//! ## Design Notes
//!
//! Peers are addressed by their [`Identity`], so limits are keyed on it:
//! - **sender identity** for offer / answer / ICE requests
//! - **target identity** for channel opens
//!
//! Both use the governor crate's keyed rate limiters backed by DashMap. A
//! direct limiter caps aggregate signaling throughput.

use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use signal_types::Identity;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits signaling requests per sending identity.
    signal_limiter: Arc<KeyedLimiter<Identity>>,

    /// Limits channel opens per identity.
    connection_limiter: Arc<KeyedLimiter<Identity>>,

    /// Global rate limiter across all senders.
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("signal_limiter", &"KeyedLimiter<Identity>")
            .field("connection_limiter", &"KeyedLimiter<Identity>")
            .field("global_limiter", &"DirectLimiter")
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// Zero values are clamped to one; [`crate::config::Config::validate`]
    /// rejects them before they get here.
    pub fn new(config: &LimitsConfig) -> Self {
        let signal_quota = Quota::per_minute(non_zero(config.signals_per_minute));
        let connection_quota = Quota::per_minute(non_zero(config.connections_per_minute));
        let global_quota = Quota::per_second(non_zero(config.global_requests_per_second));

        Self {
            signal_limiter: Arc::new(RateLimiter::keyed(signal_quota)),
            connection_limiter: Arc::new(RateLimiter::keyed(connection_quota)),
            global_limiter: Arc::new(RateLimiter::direct(global_quota)),
        }
    }

    /// Check if a signaling request from `sender` is allowed.
    pub fn check_signal(&self, sender: &Identity) -> Result<(), RateLimitError> {
        self.signal_limiter
            .check_key(sender)
            .map_err(|_| RateLimitError::SignalLimitExceeded)
    }

    /// Check if opening a channel for `identity` is allowed.
    pub fn check_connection(&self, identity: &Identity) -> Result<(), RateLimitError> {
        self.connection_limiter
            .check_key(identity)
            .map_err(|_| RateLimitError::ConnectionLimitExceeded)
    }

    /// Check if the global request rate is within limits.
    ///
    /// This is a server-wide rate limit that caps aggregate throughput
    /// regardless of individual sender limits.
    pub fn check_global(&self) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)
    }

    /// Get the number of tracked sender keys (for metrics).
    pub fn signal_keys_count(&self) -> usize {
        self.signal_limiter.len()
    }

    /// Get the number of tracked connection keys (for metrics).
    pub fn connection_keys_count(&self) -> usize {
        self.connection_limiter.len()
    }

    /// Evict idle entries from the keyed limiters.
    ///
    /// `retain_recent()` removes entries whose cells have fully recharged.
    /// Called periodically from the cleanup task.
    pub fn shrink(&self) {
        self.signal_limiter.retain_recent();
        self.connection_limiter.retain_recent();
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Rate limit error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Too many signaling requests from this sender.
    #[error("signal rate limit exceeded")]
    SignalLimitExceeded,
    /// Too many channel opens for this identity.
    #[error("connection rate limit exceeded")]
    ConnectionLimitExceeded,
    /// Global request rate exceeded across all senders.
    #[error("global rate limit exceeded")]
    GlobalLimitExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(signals: u32, connections: u32, global: u32) -> LimitsConfig {
        LimitsConfig {
            signals_per_minute: signals,
            connections_per_minute: connections,
            global_requests_per_second: global,
            ..LimitsConfig::default()
        }
    }

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    #[test]
    fn create_rate_limits() {
        let limits = RateLimits::new(&LimitsConfig::default());
        assert_eq!(limits.signal_keys_count(), 0);
        assert_eq!(limits.connection_keys_count(), 0);
    }

    #[test]
    fn signal_limit_allows_within_quota() {
        let limits = RateLimits::new(&config(5, 100, 1000));
        let alice = id("alice");

        for _ in 0..5 {
            assert!(limits.check_signal(&alice).is_ok());
        }

        assert_eq!(
            limits.check_signal(&alice),
            Err(RateLimitError::SignalLimitExceeded)
        );
    }

    #[test]
    fn connection_limit_allows_within_quota() {
        let limits = RateLimits::new(&config(100, 3, 1000));
        let bob = id("bob");

        for _ in 0..3 {
            assert!(limits.check_connection(&bob).is_ok());
        }

        assert_eq!(
            limits.check_connection(&bob),
            Err(RateLimitError::ConnectionLimitExceeded)
        );
    }

    #[test]
    fn different_identities_have_independent_limits() {
        let limits = RateLimits::new(&config(2, 2, 1000));
        let a = id("a");
        let b = id("b");

        assert!(limits.check_signal(&a).is_ok());
        assert!(limits.check_signal(&a).is_ok());
        assert!(limits.check_signal(&a).is_err());

        assert!(limits.check_signal(&b).is_ok());
        assert!(limits.check_signal(&b).is_ok());
        assert!(limits.check_signal(&b).is_err());
    }

    #[test]
    fn global_rate_limiter_rejects_excess() {
        let limits = RateLimits::new(&config(100, 100, 5));

        for _ in 0..5 {
            assert!(limits.check_global().is_ok());
        }

        assert_eq!(
            limits.check_global(),
            Err(RateLimitError::GlobalLimitExceeded)
        );
    }

    #[test]
    fn zero_quota_clamped_to_one() {
        let limits = RateLimits::new(&config(0, 0, 0));
        assert!(limits.check_signal(&id("z")).is_ok());
        assert!(limits.check_signal(&id("z")).is_err());
    }

    #[test]
    fn rate_limit_error_display() {
        assert_eq!(
            RateLimitError::SignalLimitExceeded.to_string(),
            "signal rate limit exceeded"
        );
        assert_eq!(
            RateLimitError::GlobalLimitExceeded.to_string(),
            "global rate limit exceeded"
        );
    }

    #[test]
    fn shrink_does_not_panic() {
        let limits = RateLimits::new(&LimitsConfig::default());
        let _ = limits.check_signal(&id("a"));
        let _ = limits.check_connection(&id("b"));
        assert!(limits.signal_keys_count() > 0);

        // freshly used entries may or may not be evicted depending on timing
        limits.shrink();
    }
}
