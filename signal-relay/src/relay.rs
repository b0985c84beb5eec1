//! Relay engine: deliver a signaling message now, queue it, or drop it.
//!
//! Routing rules:
//! - recipient online: send once on its channel; a failed send drops the
//!   message (no fallback to the queue)
//! - recipient offline, offer or answer: append to the recipient's queue
//! - recipient offline, ICE candidate: drop
//!
//! Ordering: for one identity, `attach` drains its queue, opens a channel
//! large enough to hold all of it plus `buffer` live messages, and installs
//! the session inside the same registry slot lock that `route` holds while it
//! decides between sending and queueing. A message is therefore either queued
//! before the flush (and flushed) or sent live after it, never stranded.
//!
//! Lock order is always registry slot, then queue. Nothing here awaits.

use crate::error::DeliveryMiss;
use crate::pending::{Enqueued, PendingQueue};
use crate::registry::{ConnectionId, SessionHandle, SessionRegistry};
use signal_types::{Envelope, Identity, SignalingMessage};
use tokio::sync::mpsc;

/// What happened to a routed message.
///
/// Internal bookkeeping only; the sender is acknowledged identically in
/// every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Sent on the recipient's channel.
    Delivered,
    /// Held for the recipient's next bind.
    Queued {
        /// Queue length afterwards.
        depth: usize,
        /// Whether an older message was evicted to make room.
        evicted: bool,
    },
    /// Not delivered and not queued.
    Dropped(DeliveryMiss),
}

/// A freshly bound session.
#[derive(Debug)]
pub struct Attached {
    /// Connection id of the new session.
    pub connection: ConnectionId,
    /// Receiving half of the session's channel, already holding the
    /// flushed queue.
    pub outbound: mpsc::Receiver<Envelope>,
    /// Whether an existing session for the identity was replaced.
    pub replaced: bool,
    /// Queued messages handed to the new channel.
    pub flushed: usize,
}

/// Routes signaling messages between sessions and the pending queue.
#[derive(Debug, Default)]
pub struct RelayEngine {
    sessions: SessionRegistry,
    pending: PendingQueue,
}

impl RelayEngine {
    /// Create an engine over an empty registry and the given queue.
    pub fn new(pending: PendingQueue) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            pending,
        }
    }

    /// Live session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Pending queue.
    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    /// Deliver, queue or drop `message` for its recipient.
    pub fn route(&self, message: SignalingMessage) -> RouteOutcome {
        let to = message.to().clone();
        self.sessions.with_session(&to, |session| match session {
            Some(session) => match session.deliver(Envelope::from(&message)) {
                Ok(()) => {
                    tracing::debug!(
                        "Delivered {} {} -> {} on {:?}",
                        message.kind(),
                        message.from(),
                        to,
                        session.id()
                    );
                    RouteOutcome::Delivered
                }
                Err(miss) => {
                    tracing::warn!(
                        "Dropped {} {} -> {}: {}",
                        message.kind(),
                        message.from(),
                        to,
                        miss
                    );
                    RouteOutcome::Dropped(miss)
                }
            },
            None if message.kind().is_queueable() => {
                let kind = message.kind();
                match self.pending.enqueue(to.clone(), message) {
                    Enqueued::Appended { depth } => {
                        tracing::debug!("Queued {} for offline {} (depth {})", kind, to, depth);
                        RouteOutcome::Queued {
                            depth,
                            evicted: false,
                        }
                    }
                    Enqueued::Evicted { evicted } => {
                        tracing::warn!(
                            "Queue for {} at capacity, evicted {} from {}",
                            to,
                            evicted.kind(),
                            evicted.from()
                        );
                        RouteOutcome::Queued {
                            depth: self.pending.depth(&to),
                            evicted: true,
                        }
                    }
                }
            }
            None => {
                tracing::debug!(
                    "Discarded {} {} -> {}: recipient offline",
                    message.kind(),
                    message.from(),
                    to
                );
                RouteOutcome::Dropped(DeliveryMiss::NotQueueable)
            }
        })
    }

    /// Open a session for `identity`, flush its queue onto it and bind it.
    ///
    /// The channel holds every queued message plus `buffer` more, so the
    /// flush never overflows. Queued messages reach the channel before any
    /// message routed after this call returns.
    pub fn attach(&self, identity: Identity, buffer: usize) -> Attached {
        let queue_key = identity.clone();
        let (replaced, (connection, outbound, flushed)) = self.sessions.bind_with(identity, || {
            let queued = self.pending.take(&queue_key);
            let flushed = queued.len();
            let (handle, outbound) = SessionHandle::channel(buffer.saturating_add(flushed));
            for message in queued {
                if let Err(miss) = handle.deliver(Envelope::from(message)) {
                    tracing::warn!("Lost queued message for {}: {}", queue_key, miss);
                }
            }
            let connection = handle.id();
            (handle, (connection, outbound, flushed))
        });

        if let Some(previous) = &replaced {
            tracing::info!(
                "Session for {} replaced ({:?} superseded)",
                queue_key,
                previous.id()
            );
        }

        Attached {
            connection,
            outbound,
            replaced: replaced.is_some(),
            flushed,
        }
    }

    /// Unbind `identity` if its session still belongs to `connection`.
    ///
    /// Returns `true` when the identity went offline as a result.
    pub fn detach(&self, identity: &Identity, connection: ConnectionId) -> bool {
        self.sessions.unbind_connection(identity, connection)
    }
}
