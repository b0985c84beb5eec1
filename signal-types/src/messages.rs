//! Signaling messages routed by the relay.
//!
//! The relay never interprets the payload: an SDP offer, an SDP answer and an
//! ICE candidate all travel as opaque strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Identity, SignalError};

/// Which step of connection negotiation a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Session description offer
    Offer,
    /// Session description answer
    Answer,
    /// Trickled ICE candidate
    Ice,
}

impl SignalKind {
    /// Whether a message of this kind is held for an offline recipient.
    ///
    /// ICE candidates are time-sensitive and are only ever delivered live.
    pub fn is_queueable(&self) -> bool {
        matches!(self, Self::Offer | Self::Answer)
    }

    /// Name of the JSON field carrying this kind's payload.
    pub fn payload_field(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Ice => "candidate",
        }
    }

    /// Wire tag used in the envelope `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Ice => "ice",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated signaling message addressed from one identity to another.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingMessage {
    kind: SignalKind,
    from: Identity,
    to: Identity,
    payload: String,
}

impl SignalingMessage {
    /// Build a message, rejecting an empty payload.
    pub fn new(
        kind: SignalKind,
        from: Identity,
        to: Identity,
        payload: impl Into<String>,
    ) -> Result<Self, SignalError> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(SignalError::MissingField(kind.payload_field()));
        }
        Ok(Self {
            kind,
            from,
            to,
            payload,
        })
    }

    /// Build a message from raw request fields.
    ///
    /// Fields are checked in the order `from`, `to`, payload; the first
    /// absent or empty one is reported.
    pub fn from_fields(
        kind: SignalKind,
        from: Option<String>,
        to: Option<String>,
        payload: Option<String>,
    ) -> Result<Self, SignalError> {
        let from = Identity::from_field(from, "from")?;
        let to = Identity::from_field(to, "to")?;
        let payload = payload.ok_or(SignalError::MissingField(kind.payload_field()))?;
        Self::new(kind, from, to, payload)
    }

    /// Message kind.
    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Sending identity.
    pub fn from(&self) -> &Identity {
        &self.from
    }

    /// Recipient identity.
    pub fn to(&self) -> &Identity {
        &self.to
    }

    /// Opaque payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Enforce a payload size cap in bytes.
    pub fn check_size(&self, limit: usize) -> Result<(), SignalError> {
        if self.payload.len() > limit {
            return Err(SignalError::PayloadTooLarge {
                size: self.payload.len(),
                limit,
            });
        }
        Ok(())
    }
}
