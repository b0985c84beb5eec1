//! Error types for the signaling wire format.

use thiserror::Error;

/// Errors raised while validating or encoding signaling data.
#[derive(Debug, Error)]
pub enum SignalError {
    /// A required field was absent, null or empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Payload exceeds the relay's configured size cap
    #[error("payload too large: {size} bytes (limit: {limit} bytes)")]
    PayloadTooLarge {
        /// Actual payload size in bytes.
        size: usize,
        /// Maximum accepted size in bytes.
        limit: usize,
    },

    /// JSON encoding or decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SignalError {
    /// Whether this error was caused by an absent field.
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingField(_))
    }
}
