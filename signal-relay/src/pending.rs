//! Pending queue: signaling messages held for offline recipients.
//!
//! One FIFO per identity, created on first enqueue and removed entirely when
//! drained. Delivery from the queue is at-most-once: a drained message is
//! never put back, whatever happens to it afterwards.
//!
//! Unbounded by default. A per-identity capacity evicts the oldest entry and
//! a TTL discards entries at drain time and during cleanup.

use dashmap::DashMap;
use signal_types::{Identity, SignalingMessage};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A queued message and when it was queued.
#[derive(Debug, Clone)]
struct Queued {
    message: SignalingMessage,
    enqueued_at: Instant,
}

/// Result of an enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// Appended; `depth` is the queue length afterwards.
    Appended {
        /// Queue length including the new message.
        depth: usize,
    },
    /// Appended after evicting the oldest message to stay within capacity.
    Evicted {
        /// The message that was dropped.
        evicted: SignalingMessage,
    },
}

/// Per-identity FIFO of undelivered signaling messages.
#[derive(Debug, Default)]
pub struct PendingQueue {
    queues: DashMap<Identity, VecDeque<Queued>>,
    capacity: Option<usize>,
    ttl: Option<Duration>,
}

impl PendingQueue {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue with an optional per-identity capacity and TTL.
    pub fn with_limits(capacity: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            queues: DashMap::new(),
            capacity: capacity.filter(|c| *c > 0),
            ttl,
        }
    }

    /// Append `message` to the queue for `identity`.
    pub fn enqueue(&self, identity: Identity, message: SignalingMessage) -> Enqueued {
        let mut queue = self.queues.entry(identity).or_default();

        let evicted = match self.capacity {
            Some(cap) if queue.len() >= cap => queue.pop_front().map(|q| q.message),
            _ => None,
        };

        queue.push_back(Queued {
            message,
            enqueued_at: Instant::now(),
        });

        match evicted {
            Some(evicted) => Enqueued::Evicted { evicted },
            None => Enqueued::Appended { depth: queue.len() },
        }
    }

    /// Remove and return everything queued for `identity`, oldest first.
    ///
    /// Expired entries are discarded. The queue entry is gone afterwards.
    pub fn take(&self, identity: &Identity) -> Vec<SignalingMessage> {
        let Some((_, queue)) = self.queues.remove(identity) else {
            return Vec::new();
        };
        let now = Instant::now();
        queue
            .into_iter()
            .filter(|q| !self.is_expired(q, now))
            .map(|q| q.message)
            .collect()
    }

    /// Number of messages queued for `identity`.
    pub fn depth(&self, identity: &Identity) -> usize {
        self.queues.get(identity).map(|q| q.len()).unwrap_or(0)
    }

    /// Number of identities with queued messages.
    pub fn identities(&self) -> usize {
        self.queues.len()
    }

    /// Total queued messages across all identities.
    pub fn total_messages(&self) -> usize {
        self.queues.iter().map(|q| q.value().len()).sum()
    }

    /// Drop expired messages everywhere, removing queues left empty.
    ///
    /// Returns the number of messages dropped. No-op without a TTL.
    pub fn reap_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Instant::now();
        let mut dropped = 0;
        self.queues.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|q| !self.is_expired(q, now));
            dropped += before - queue.len();
            !queue.is_empty()
        });
        dropped
    }

    fn is_expired(&self, queued: &Queued, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(queued.enqueued_at) >= ttl,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_types::SignalKind;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn msg(kind: SignalKind, from: &str, to: &str, payload: &str) -> SignalingMessage {
        SignalingMessage::new(kind, id(from), id(to), payload).unwrap()
    }

    #[test]
    fn enqueue_creates_queue_lazily() {
        let queue = PendingQueue::new();
        assert_eq!(queue.identities(), 0);

        let out = queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "1"));
        assert_eq!(out, Enqueued::Appended { depth: 1 });
        assert_eq!(queue.depth(&id("bob")), 1);
        assert_eq!(queue.identities(), 1);
    }

    #[test]
    fn drain_preserves_order_and_deletes_entry() {
        let queue = PendingQueue::new();
        queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "1"));
        queue.enqueue(id("bob"), msg(SignalKind::Answer, "c", "bob", "2"));

        let seen: Vec<_> = queue
            .take(&id("bob"))
            .iter()
            .map(|m| m.payload().to_string())
            .collect();

        assert_eq!(seen, vec!["1", "2"]);
        assert_eq!(queue.depth(&id("bob")), 0);
        assert_eq!(queue.identities(), 0);
    }

    #[test]
    fn drain_of_absent_identity_is_empty() {
        let queue = PendingQueue::new();
        assert!(queue.take(&id("nobody")).is_empty());
        assert_eq!(queue.identities(), 0);
    }

    #[test]
    fn second_drain_delivers_nothing() {
        let queue = PendingQueue::new();
        queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "1"));
        assert_eq!(queue.take(&id("bob")).len(), 1);
        assert!(queue.take(&id("bob")).is_empty());
    }

    #[test]
    fn queues_isolated_per_identity() {
        let queue = PendingQueue::new();
        queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "1"));
        queue.enqueue(id("carol"), msg(SignalKind::Offer, "a", "carol", "2"));

        assert_eq!(queue.take(&id("bob")).len(), 1);
        assert_eq!(queue.depth(&id("carol")), 1);
        assert_eq!(queue.total_messages(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let queue = PendingQueue::with_limits(Some(2), None);
        queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "1"));
        queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "2"));
        let out = queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "3"));

        match out {
            Enqueued::Evicted { evicted } => assert_eq!(evicted.payload(), "1"),
            other => panic!("expected eviction, got {:?}", other),
        }
        let payloads: Vec<_> = queue
            .take(&id("bob"))
            .iter()
            .map(|m| m.payload().to_string())
            .collect();
        assert_eq!(payloads, vec!["2", "3"]);
    }

    #[test]
    fn zero_capacity_means_unbounded() {
        let queue = PendingQueue::with_limits(Some(0), None);
        for i in 0..100 {
            queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", &i.to_string()));
        }
        assert_eq!(queue.depth(&id("bob")), 100);
    }

    #[test]
    fn expired_messages_not_delivered() {
        let queue = PendingQueue::with_limits(None, Some(Duration::ZERO));
        queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "1"));
        assert!(queue.take(&id("bob")).is_empty());
        assert_eq!(queue.identities(), 0);
    }

    #[test]
    fn reap_expired_removes_empty_queues() {
        let queue = PendingQueue::with_limits(None, Some(Duration::ZERO));
        queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "1"));
        queue.enqueue(id("carol"), msg(SignalKind::Answer, "a", "carol", "2"));

        assert_eq!(queue.reap_expired(), 2);
        assert_eq!(queue.identities(), 0);
    }

    #[test]
    fn reap_without_ttl_is_noop() {
        let queue = PendingQueue::new();
        queue.enqueue(id("bob"), msg(SignalKind::Offer, "a", "bob", "1"));
        assert_eq!(queue.reap_expired(), 0);
        assert_eq!(queue.depth(&id("bob")), 1);
    }
}
