//! # signal-types
//!
//! Wire format types for the rendezvous signaling relay.
//!
//! This crate provides the types shared between the relay and its peers:
//! - [`Identity`], [`Timestamp`] - Addressing and presence time
//! - [`SignalKind`], [`SignalingMessage`] - Offer / answer / ICE candidate payloads
//! - [`Envelope`] - JSON frame delivered over an open channel
//! - [`api`] - HTTP request and response bodies
//! - [`SignalError`] - Validation and encoding errors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
mod envelope;
mod error;
mod ids;
mod messages;

pub use envelope::Envelope;
pub use error::SignalError;
pub use ids::{Identity, Timestamp};
pub use messages::{SignalKind, SignalingMessage};
