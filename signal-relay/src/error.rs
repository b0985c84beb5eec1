//! Error types for signal-relay.

use signal_types::SignalError;

use crate::limits::RateLimitError;

/// Main error type for relay startup and background tasks.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity directory errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    /// The backing store could not serve the request.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Per-request errors, reported synchronously to the caller.
///
/// None of these leave state mutated. The HTTP layer maps each variant to a
/// status code.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(#[from] SignalError),

    /// Request body could not be decoded.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// No directory record for the identity.
    #[error("user not found: {identity}")]
    NotFound {
        /// The identity that was looked up.
        identity: String,
    },

    /// Shared secret missing or wrong.
    #[error("unauthorized")]
    Unauthorized,

    /// The shared secret is not configured on the server.
    #[error("server configuration error: API_KEY not set")]
    Misconfigured,

    /// Rate limit exceeded.
    #[error("rate limit exceeded: {0}")]
    RateLimited(#[from] RateLimitError),

    /// Too many open channels.
    #[error("session capacity reached ({limit})")]
    AtCapacity {
        /// Configured maximum.
        limit: usize,
    },

    /// Directory failure.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// Why a signaling message did not reach its recipient.
///
/// Absorbed by the relay's enqueue-or-drop policy; never surfaced to the
/// sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryMiss {
    /// Recipient's outbound buffer is full.
    #[error("channel buffer full")]
    ChannelFull,
    /// Recipient's channel was registered but its writer is gone.
    #[error("channel closed")]
    ChannelClosed,
    /// Message kind is never held for offline recipients.
    #[error("message kind is not queueable")]
    NotQueueable,
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for request handling.
pub type RequestResult<T> = std::result::Result<T, RequestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_displays_inner_reason() {
        let err = RequestError::from(SignalError::MissingField("to"));
        assert_eq!(err.to_string(), "missing required field: to");
    }

    #[test]
    fn misconfigured_message() {
        assert_eq!(
            RequestError::Misconfigured.to_string(),
            "server configuration error: API_KEY not set"
        );
    }

    #[test]
    fn delivery_miss_display() {
        assert_eq!(DeliveryMiss::ChannelFull.to_string(), "channel buffer full");
        assert_eq!(DeliveryMiss::NotQueueable.to_string(), "message kind is not queueable");
    }
}
