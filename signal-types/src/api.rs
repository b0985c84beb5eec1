//! HTTP request and response bodies.
//!
//! Keys are camelCase on the wire. Request fields are all optional at the
//! serde layer so an absent field becomes a [`SignalError::MissingField`]
//! rather than an opaque decode failure.

use serde::{Deserialize, Serialize};

use crate::{Identity, SignalError, SignalKind, SignalingMessage, Timestamp};

/// Body of `POST /register`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Identity being registered
    pub user_id: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Human-readable name
    pub display_name: Option<String>,
    /// Public-key bundle, opaque to the relay
    pub pre_key_bundle: Option<serde_json::Value>,
    /// Optional avatar reference
    pub profile_image: Option<String>,
}

impl RegisterRequest {
    /// Validate the request and stamp it into a profile seen at `now`.
    pub fn into_profile(self, now: Timestamp) -> Result<UserProfile, SignalError> {
        let user_id = Identity::from_field(self.user_id, "userId")?;
        let pre_key_bundle = match self.pre_key_bundle {
            None | Some(serde_json::Value::Null) => {
                return Err(SignalError::MissingField("preKeyBundle"))
            }
            Some(serde_json::Value::String(s)) if s.is_empty() => {
                return Err(SignalError::MissingField("preKeyBundle"))
            }
            Some(bundle) => bundle,
        };
        let email = non_empty(self.email, "email")?;
        let display_name = non_empty(self.display_name, "displayName")?;

        Ok(UserProfile {
            user_id,
            email,
            display_name,
            pre_key_bundle,
            profile_image: self.profile_image.filter(|s| !s.is_empty()),
            last_seen: now,
        })
    }
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, SignalError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SignalError::MissingField(field)),
    }
}

/// A directory record as returned by `GET /lookup/{userId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Registered identity
    pub user_id: Identity,
    /// Contact email
    pub email: String,
    /// Human-readable name
    pub display_name: String,
    /// Public-key bundle, opaque to the relay
    pub pre_key_bundle: serde_json::Value,
    /// Optional avatar reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    /// Last time the identity was registered or went offline
    pub last_seen: Timestamp,
}

/// Response to a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Always `true`
    pub success: bool,
    /// The registered identity
    pub user_id: Identity,
}

/// Body of `POST /offer`, `POST /answer` and `POST /ice`.
///
/// Only the payload field matching the route is read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRequest {
    /// Sending identity
    pub from: Option<String>,
    /// Recipient identity
    pub to: Option<String>,
    /// Offer payload (`/offer`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<String>,
    /// Answer payload (`/answer`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// ICE candidate payload (`/ice`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
}

impl SignalRequest {
    /// Validate into a message of the given kind.
    pub fn into_message(self, kind: SignalKind) -> Result<SignalingMessage, SignalError> {
        let payload = match kind {
            SignalKind::Offer => self.offer,
            SignalKind::Answer => self.answer,
            SignalKind::Ice => self.candidate,
        };
        SignalingMessage::from_fields(kind, self.from, self.to, payload)
    }
}

/// Acknowledgement returned by the signaling routes.
///
/// Carries no delivery information: a live send, a queued message and a
/// dropped ICE candidate all acknowledge identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Always `true`
    pub success: bool,
}

impl Ack {
    /// The one acknowledgement value.
    pub const OK: Ack = Ack { success: true };
}

/// Response of `GET /presence/{userId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    /// Whether the identity currently has an open channel
    pub online: bool,
    /// Directory last-seen time, `null` when unregistered
    pub last_seen: Option<Timestamp>,
}

/// JSON error body returned with every non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason
    pub error: String,
}
