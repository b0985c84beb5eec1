//! Session registry: which identities are reachable right now.
//!
//! Maps an [`Identity`] to the sending half of its open channel. There is at
//! most one session per identity; binding again replaces the previous one.
//!
//! The registry is the only place that decides "is X online", so the relay
//! engine runs its bind+drain and lookup+enqueue steps inside the per-slot
//! critical sections exposed by [`SessionRegistry::bind_with`] and
//! [`SessionRegistry::with_session`].

use crate::error::DeliveryMiss;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use signal_types::{Envelope, Identity};
use std::fmt;
use std::time::Instant;
use tokio::sync::mpsc;

/// Identifies one transport connection.
///
/// Distinguishes a replaced session from its successor when both belong to
/// the same identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Create a new random ConnectionId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", &self.to_string()[..8])
    }
}

/// Handle to an open channel.
///
/// Cloning the handle clones the sender; the channel closes once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Envelope>,
    opened_at: Instant,
}

impl SessionHandle {
    /// Create a handle and the receiving half of its bounded channel.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            tx,
            opened_at: Instant::now(),
        };
        (handle, rx)
    }

    /// The connection this handle belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// When the channel was opened.
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Send without waiting.
    ///
    /// A full buffer or a dropped receiver fails immediately.
    pub fn deliver(&self, envelope: Envelope) -> Result<(), DeliveryMiss> {
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryMiss::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryMiss::ChannelClosed,
        })
    }
}

/// Registry of live sessions keyed by identity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: DashMap<Identity, SessionHandle>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` for `identity`, returning the session it replaced.
    pub fn bind(&self, identity: Identity, handle: SessionHandle) -> Option<SessionHandle> {
        self.bind_with(identity, || (handle, ())).0
    }

    /// Build a session with `make` and install it, all under the slot lock.
    ///
    /// No [`with_session`](Self::with_session) call for the same identity
    /// can interleave between `make` and the install. `make` must not touch
    /// this registry.
    pub fn bind_with<R>(
        &self,
        identity: Identity,
        make: impl FnOnce() -> (SessionHandle, R),
    ) -> (Option<SessionHandle>, R) {
        match self.slots.entry(identity) {
            Entry::Occupied(mut occupied) => {
                let (handle, out) = make();
                (Some(occupied.insert(handle)), out)
            }
            Entry::Vacant(vacant) => {
                let (handle, out) = make();
                vacant.insert(handle);
                (None, out)
            }
        }
    }

    /// Remove whatever session is bound to `identity`.
    pub fn unbind(&self, identity: &Identity) -> Option<SessionHandle> {
        self.slots.remove(identity).map(|(_, handle)| handle)
    }

    /// Remove the session for `identity` only if it belongs to `connection`.
    ///
    /// Returns `true` when an entry was removed.
    pub fn unbind_connection(&self, identity: &Identity, connection: ConnectionId) -> bool {
        self.slots
            .remove_if(identity, |_, handle| handle.id == connection)
            .is_some()
    }

    /// Current session for `identity`, if any.
    pub fn lookup(&self, identity: &Identity) -> Option<SessionHandle> {
        self.slots.get(identity).map(|slot| slot.value().clone())
    }

    /// Whether `identity` has a live session.
    pub fn is_online(&self, identity: &Identity) -> bool {
        self.slots.contains_key(identity)
    }

    /// Run `f` against the slot for `identity` while holding its lock.
    ///
    /// The lock is held even when the slot is empty, so a concurrent
    /// [`bind_with`](Self::bind_with) observes either everything `f` did or
    /// nothing.
    pub fn with_session<R>(
        &self,
        identity: &Identity,
        f: impl FnOnce(Option<&SessionHandle>) -> R,
    ) -> R {
        match self.slots.entry(identity.clone()) {
            Entry::Occupied(occupied) => f(Some(occupied.get())),
            Entry::Vacant(vacant) => {
                let out = f(None);
                drop(vacant);
                out
            }
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_types::{SignalKind, SignalingMessage};

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn offer(from: &str, to: &str) -> Envelope {
        SignalingMessage::new(SignalKind::Offer, id(from), id(to), "sdp")
            .unwrap()
            .into()
    }

    #[test]
    fn bind_lookup_unbind() {
        let registry = SessionRegistry::new();
        let (handle, _rx) = SessionHandle::channel(4);
        let conn = handle.id();

        assert!(!registry.is_online(&id("bob")));
        assert!(registry.bind(id("bob"), handle).is_none());
        assert!(registry.is_online(&id("bob")));
        assert_eq!(registry.lookup(&id("bob")).unwrap().id(), conn);
        assert_eq!(registry.len(), 1);

        assert!(registry.unbind(&id("bob")).is_some());
        assert!(!registry.is_online(&id("bob")));
        assert!(registry.is_empty());
    }

    #[test]
    fn unbind_absent_is_noop() {
        let registry = SessionRegistry::new();
        assert!(registry.unbind(&id("nobody")).is_none());
        assert!(registry.lookup(&id("nobody")).is_none());
    }

    #[test]
    fn rebind_replaces_previous_session() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = SessionHandle::channel(4);
        let (second, _rx2) = SessionHandle::channel(4);
        let first_id = first.id();
        let second_id = second.id();

        registry.bind(id("bob"), first);
        let replaced = registry.bind(id("bob"), second).unwrap();

        assert_eq!(replaced.id(), first_id);
        assert_eq!(registry.lookup(&id("bob")).unwrap().id(), second_id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stale_connection_cannot_unbind_successor() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = SessionHandle::channel(4);
        let (second, _rx2) = SessionHandle::channel(4);
        let first_id = first.id();
        let second_id = second.id();

        registry.bind(id("bob"), first);
        registry.bind(id("bob"), second);

        assert!(!registry.unbind_connection(&id("bob"), first_id));
        assert!(registry.is_online(&id("bob")));
        assert!(registry.unbind_connection(&id("bob"), second_id));
        assert!(!registry.is_online(&id("bob")));
    }

    #[test]
    fn with_session_on_empty_slot_does_not_insert() {
        let registry = SessionRegistry::new();
        let seen = registry.with_session(&id("ghost"), |slot| slot.is_some());
        assert!(!seen);
        assert!(registry.is_empty());
    }

    #[test]
    fn bind_with_installs_what_make_builds() {
        let registry = SessionRegistry::new();

        let (replaced, (conn, mut rx)) = registry.bind_with(id("bob"), || {
            let (handle, rx) = SessionHandle::channel(4);
            assert!(handle.deliver(offer("a", "bob")).is_ok());
            let conn = handle.id();
            (handle, (conn, rx))
        });

        assert!(replaced.is_none());
        assert_eq!(registry.lookup(&id("bob")).unwrap().id(), conn);
        assert_eq!(rx.try_recv().unwrap().sender().as_str(), "a");
    }

    #[test]
    fn deliver_fails_fast_when_full() {
        let (handle, _rx) = SessionHandle::channel(1);
        assert!(handle.deliver(offer("a", "b")).is_ok());
        assert_eq!(handle.deliver(offer("a", "b")), Err(DeliveryMiss::ChannelFull));
    }

    #[test]
    fn deliver_reports_closed_receiver() {
        let (handle, rx) = SessionHandle::channel(4);
        drop(rx);
        assert!(handle.is_closed());
        assert_eq!(handle.deliver(offer("a", "b")), Err(DeliveryMiss::ChannelClosed));
    }
}
