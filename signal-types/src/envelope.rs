//! Envelope - the JSON frame pushed to a peer over its open channel.

use serde::{Deserialize, Serialize};

use crate::{Identity, SignalError, SignalKind, SignalingMessage};

/// A signaling message as delivered to its recipient.
///
/// Tagged by `type` with the payload under a kind-specific key, e.g.
/// `{"type":"ice","from":"alice","candidate":"..."}`. The recipient is
/// implied by the channel and is not repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Session description offer
    Offer {
        /// Sending identity
        from: Identity,
        /// Opaque offer payload
        offer: String,
    },
    /// Session description answer
    Answer {
        /// Sending identity
        from: Identity,
        /// Opaque answer payload
        answer: String,
    },
    /// ICE candidate
    Ice {
        /// Sending identity
        from: Identity,
        /// Opaque candidate payload
        candidate: String,
    },
}

impl Envelope {
    /// Kind of the wrapped message.
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Offer { .. } => SignalKind::Offer,
            Self::Answer { .. } => SignalKind::Answer,
            Self::Ice { .. } => SignalKind::Ice,
        }
    }

    /// Sending identity.
    pub fn sender(&self) -> &Identity {
        match self {
            Self::Offer { from, .. } | Self::Answer { from, .. } | Self::Ice { from, .. } => from,
        }
    }

    /// Opaque payload.
    pub fn payload(&self) -> &str {
        match self {
            Self::Offer { offer, .. } => offer,
            Self::Answer { answer, .. } => answer,
            Self::Ice { candidate, .. } => candidate,
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, SignalError> {
        serde_json::to_string(self).map_err(SignalError::Json)
    }

    /// Decode from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, SignalError> {
        serde_json::from_str(text).map_err(SignalError::Json)
    }
}

impl From<&SignalingMessage> for Envelope {
    fn from(msg: &SignalingMessage) -> Self {
        let from = msg.from().clone();
        let payload = msg.payload().to_string();
        match msg.kind() {
            SignalKind::Offer => Self::Offer {
                from,
                offer: payload,
            },
            SignalKind::Answer => Self::Answer {
                from,
                answer: payload,
            },
            SignalKind::Ice => Self::Ice {
                from,
                candidate: payload,
            },
        }
    }
}

impl From<SignalingMessage> for Envelope {
    fn from(msg: SignalingMessage) -> Self {
        Envelope::from(&msg)
    }
}
