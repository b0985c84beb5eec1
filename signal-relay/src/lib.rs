//! # signal-relay
//!
//! Rendezvous and signaling relay for WebRTC peers.
//!
//! This crate implements a relay server that:
//! - Keeps a directory of registered identities and their public-key bundles
//! - Routes SDP offers, answers and ICE candidates between identities
//! - Holds offers and answers for offline recipients and flushes them on connect
//! - Tracks presence from open WebSocket channels
//!
//! The relay never interprets signaling payloads; it only moves them.
//!
//! ## Architecture
//!
//! ```text
//!  Peer A ──POST /offer──┐                  ┌── Peer B
//!                        │                  │   (WebSocket /ws?userId=B)
//!        ┌───────────────┴──────────────────┴───┐
//!        │              signal-relay             │
//!        │  RelayEngine ─┬─ SessionRegistry ─────┼──► live envelope
//!        │               └─ PendingQueue ────────┼──► flushed on connect
//!        │  Directory (profiles, lastSeen)       │
//!        └───────────────────────────────────────┘
//! ```
//!
//! ## Delivery
//!
//! - Recipient online: the message goes straight onto its channel.
//! - Recipient offline: offers and answers are queued, ICE is dropped.
//! - A failed live send drops the message; it is never re-queued.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod limits;
pub mod pending;
pub mod registry;
pub mod relay;
pub mod server;
