//! Addressing and time types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::SignalError;

/// Stable identity naming a peer across sessions.
///
/// Opaque to the relay: any non-empty string is a valid identity and two
/// identities are equal iff their strings are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity, rejecting the empty string.
    pub fn new(value: impl Into<String>) -> Result<Self, SignalError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SignalError::MissingField("identity"));
        }
        Ok(Self(value))
    }

    /// Parse an optional field into an identity.
    ///
    /// Absent and empty values both fail with [`SignalError::MissingField`]
    /// naming `field`.
    pub fn from_field(value: Option<String>, field: &'static str) -> Result<Self, SignalError> {
        match value {
            Some(v) if !v.is_empty() => Ok(Self(v)),
            _ => Err(SignalError::MissingField(field)),
        }
    }

    /// Borrow the identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Wall-clock instant in milliseconds since the Unix epoch.
///
/// Serialized as a bare integer so peers can read it as a JS `Date.now()`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Create a timestamp from milliseconds since the epoch.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// This timestamp moved back by `age`, saturating at the epoch.
    pub fn saturating_sub(&self, age: Duration) -> Self {
        Self(self.0.saturating_sub(age.as_millis() as u64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}
