//! Per-connection lifecycle management.
//!
//! Each upgraded transport connection gets a [`ConnectionLifecycle`] that
//! binds it into the session registry, flushes queued signaling onto it, and
//! unbinds it when the transport closes or fails.
//!
//! ```text
//! Connecting --open()--> Open --finish(Closed)--> Closed   (unbind + lastSeen)
//!                          \---finish(Error)----> Errored  (unbind only)
//! ```
//!
//! The lifecycle is transport-agnostic: it hands out the receiving half of
//! the connection's channel and the transport pump forwards whatever arrives.

use crate::registry::ConnectionId;
use crate::server::SignalRelay;
use signal_types::{Envelope, Identity, Timestamp};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connection state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgraded but not yet bound.
    Connecting,
    /// Bound in the registry and receiving relayed messages.
    Open,
    /// Peer or network closed the connection.
    Closed,
    /// Transport reported an error.
    Errored,
}

/// How an open connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// Orderly close from either side.
    Closed,
    /// Transport failure.
    Error(String),
}

/// Lifecycle of one transport connection for one identity.
pub struct ConnectionLifecycle {
    relay: Arc<SignalRelay>,
    identity: Identity,
    connection: Option<ConnectionId>,
    state: ConnectionState,
}

impl std::fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLifecycle")
            .field("identity", &self.identity)
            .field("connection", &self.connection)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ConnectionLifecycle {
    /// Start a lifecycle for an upgraded connection.
    pub fn new(relay: Arc<SignalRelay>, identity: Identity) -> Self {
        Self {
            relay,
            identity,
            connection: None,
            state: ConnectionState::Connecting,
        }
    }

    /// The identity this connection serves.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connection id once open.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Connecting → Open: bind the identity and flush its queue.
    ///
    /// Returns the channel to forward to the transport, or `None` if the
    /// lifecycle has already left `Connecting` or the relay filled up since
    /// the connection was admitted (the lifecycle is then `Closed`).
    pub fn open(&mut self) -> Option<mpsc::Receiver<Envelope>> {
        if self.state != ConnectionState::Connecting {
            tracing::warn!(
                "open() on {} connection for {}",
                state_name(self.state),
                self.identity
            );
            return None;
        }

        if self.relay.check_capacity(&self.identity).is_err() {
            self.state = ConnectionState::Closed;
            return None;
        }

        let buffer = self.relay.config().limits.outbound_buffer;
        let attached = self.relay.engine().attach(self.identity.clone(), buffer);

        let metrics = self.relay.metrics();
        metrics.connections_total.fetch_add(1, Ordering::Relaxed);
        metrics
            .queued_flushed
            .fetch_add(attached.flushed as u64, Ordering::Relaxed);

        self.connection = Some(attached.connection);
        self.state = ConnectionState::Open;

        tracing::info!(
            "Session established: identity={}, connection={:?}, flushed={}, replaced={}",
            self.identity,
            attached.connection,
            attached.flushed,
            attached.replaced
        );
        Some(attached.outbound)
    }

    /// Open → Closed / Errored: unbind, and on a clean close record
    /// `lastSeen`.
    ///
    /// Returns `true` if this connection was still the identity's live
    /// session (i.e. the identity is now offline).
    pub async fn finish(&mut self, how: Disconnect) -> bool {
        let Some(connection) = self.connection.filter(|_| self.state == ConnectionState::Open)
        else {
            return false;
        };

        let went_offline = self.relay.engine().detach(&self.identity, connection);

        match &how {
            Disconnect::Closed => {
                self.state = ConnectionState::Closed;
                if went_offline {
                    self.record_last_seen().await;
                }
                tracing::info!(
                    "Connection closed: identity={}, connection={:?}, offline={}",
                    self.identity,
                    connection,
                    went_offline
                );
            }
            Disconnect::Error(reason) => {
                self.state = ConnectionState::Errored;
                tracing::warn!(
                    "Connection error: identity={}, connection={:?}: {}",
                    self.identity,
                    connection,
                    reason
                );
            }
        }

        went_offline
    }

    async fn record_last_seen(&self) {
        let directory = self.relay.directory();
        match directory.touch_last_seen(&self.identity, Timestamp::now()).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("No directory record for {}", self.identity),
            Err(e) => tracing::error!("Failed to update lastSeen for {}: {}", self.identity, e),
        }
    }
}

fn state_name(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connecting => "connecting",
        ConnectionState::Open => "open",
        ConnectionState::Closed => "closed",
        ConnectionState::Errored => "errored",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use signal_types::api::{RegisterRequest, SignalRequest};
    use signal_types::SignalKind;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    async fn relay_with(users: &[&str]) -> Arc<SignalRelay> {
        let relay = Arc::new(SignalRelay::in_memory(Config::default()));
        for user in users {
            relay
                .register_user(RegisterRequest {
                    user_id: Some(user.to_string()),
                    email: Some(format!("{user}@example.com")),
                    display_name: Some(user.to_string()),
                    pre_key_bundle: Some(serde_json::json!({"k": user})),
                    profile_image: None,
                })
                .await
                .unwrap();
        }
        relay
    }

    fn signal(kind: SignalKind, from: &str, to: &str, payload: &str) -> SignalRequest {
        let mut req = SignalRequest {
            from: Some(from.into()),
            to: Some(to.into()),
            ..SignalRequest::default()
        };
        match kind {
            SignalKind::Offer => req.offer = Some(payload.into()),
            SignalKind::Answer => req.answer = Some(payload.into()),
            SignalKind::Ice => req.candidate = Some(payload.into()),
        }
        req
    }

    #[tokio::test]
    async fn open_binds_and_flushes_in_order() {
        let relay = relay_with(&["bob"]).await;
        relay
            .send_signal(SignalKind::Offer, signal(SignalKind::Offer, "alice", "bob", "o"))
            .unwrap();
        relay
            .send_signal(SignalKind::Answer, signal(SignalKind::Answer, "carol", "bob", "a"))
            .unwrap();

        let mut lifecycle = ConnectionLifecycle::new(relay.clone(), id("bob"));
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
        let mut rx = lifecycle.open().unwrap();

        assert_eq!(lifecycle.state(), ConnectionState::Open);
        assert!(relay.engine().sessions().is_online(&id("bob")));
        assert_eq!(rx.recv().await.unwrap().kind(), SignalKind::Offer);
        assert_eq!(rx.recv().await.unwrap().kind(), SignalKind::Answer);
        assert_eq!(relay.pending_messages(), 0);
        assert_eq!(relay.metrics().queued_flushed.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn open_flushes_queue_larger_than_outbound_buffer() {
        let relay = relay_with(&["bob"]).await;
        let buffer = relay.config().limits.outbound_buffer;
        let queued = buffer + 44;
        for n in 0..queued {
            relay
                .send_signal(
                    SignalKind::Offer,
                    signal(SignalKind::Offer, "alice", "bob", &format!("sdp-{n}")),
                )
                .unwrap();
        }
        assert_eq!(relay.pending_messages(), queued);

        let mut lifecycle = ConnectionLifecycle::new(relay.clone(), id("bob"));
        let mut rx = lifecycle.open().unwrap();

        for n in 0..queued {
            assert_eq!(rx.recv().await.unwrap().payload(), format!("sdp-{n}"));
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(relay.pending_messages(), 0);
        let m = relay.metrics();
        assert_eq!(m.queued_flushed.load(Ordering::Relaxed), queued as u64);
        assert_eq!(m.signals_dropped.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn open_rechecks_session_capacity() {
        let mut config = Config::default();
        config.limits.max_concurrent_sessions = 1;
        let relay = Arc::new(SignalRelay::in_memory(config));

        // both admitted before either bound
        assert!(relay.admit_connection(&id("a")).is_ok());
        assert!(relay.admit_connection(&id("b")).is_ok());

        let mut a = ConnectionLifecycle::new(relay.clone(), id("a"));
        let _a_rx = a.open().unwrap();
        let mut b = ConnectionLifecycle::new(relay.clone(), id("b"));
        assert!(b.open().is_none());

        assert_eq!(b.state(), ConnectionState::Closed);
        assert!(!relay.engine().sessions().is_online(&id("b")));
        assert_eq!(relay.total_sessions(), 1);

        // the online identity still replaces its own session
        let mut again = ConnectionLifecycle::new(relay.clone(), id("a"));
        assert!(again.open().is_some());
        assert_eq!(relay.total_sessions(), 1);
    }

    #[tokio::test]
    async fn open_twice_is_refused() {
        let relay = relay_with(&[]).await;
        let mut lifecycle = ConnectionLifecycle::new(relay, id("bob"));
        assert!(lifecycle.open().is_some());
        assert!(lifecycle.open().is_none());
    }

    #[tokio::test]
    async fn close_unbinds_and_records_last_seen() {
        let relay = relay_with(&["bob"]).await;
        let mut lifecycle = ConnectionLifecycle::new(relay.clone(), id("bob"));
        let _rx = lifecycle.open().unwrap();

        let before = Timestamp::now();
        assert!(lifecycle.finish(Disconnect::Closed).await);
        let after = Timestamp::now();

        assert_eq!(lifecycle.state(), ConnectionState::Closed);
        let presence = relay.presence(&id("bob")).await.unwrap();
        assert!(!presence.online);
        let seen = presence.last_seen.unwrap();
        assert!(seen >= before && seen <= after);
    }

    #[tokio::test]
    async fn error_unbinds_without_touching_last_seen() {
        let relay = relay_with(&["bob"]).await;
        let registered_at = relay.presence(&id("bob")).await.unwrap().last_seen;

        let mut lifecycle = ConnectionLifecycle::new(relay.clone(), id("bob"));
        let _rx = lifecycle.open().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(lifecycle.finish(Disconnect::Error("reset".into())).await);

        assert_eq!(lifecycle.state(), ConnectionState::Errored);
        let presence = relay.presence(&id("bob")).await.unwrap();
        assert!(!presence.online);
        assert_eq!(presence.last_seen, registered_at);
    }

    #[tokio::test]
    async fn replaced_connection_close_keeps_successor_online() {
        let relay = relay_with(&["bob"]).await;
        let mut first = ConnectionLifecycle::new(relay.clone(), id("bob"));
        let mut first_rx = first.open().unwrap();
        let mut second = ConnectionLifecycle::new(relay.clone(), id("bob"));
        let _second_rx = second.open().unwrap();

        // the superseded channel ends once the registry drops its sender
        assert!(first_rx.recv().await.is_none());

        let before = relay.presence(&id("bob")).await.unwrap().last_seen;
        assert!(!first.finish(Disconnect::Closed).await);
        let presence = relay.presence(&id("bob")).await.unwrap();
        assert!(presence.online);
        assert_eq!(presence.last_seen, before);
    }

    #[tokio::test]
    async fn finish_before_open_is_noop() {
        let relay = relay_with(&[]).await;
        let mut lifecycle = ConnectionLifecycle::new(relay, id("bob"));
        assert!(!lifecycle.finish(Disconnect::Closed).await);
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn live_messages_follow_flush() {
        let relay = relay_with(&[]).await;
        relay
            .send_signal(SignalKind::Offer, signal(SignalKind::Offer, "alice", "bob", "queued"))
            .unwrap();
        let mut lifecycle = ConnectionLifecycle::new(relay.clone(), id("bob"));
        let mut rx = lifecycle.open().unwrap();
        relay
            .send_signal(SignalKind::Ice, signal(SignalKind::Ice, "alice", "bob", "live"))
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().payload(), "queued");
        assert_eq!(rx.recv().await.unwrap().payload(), "live");
    }
}
