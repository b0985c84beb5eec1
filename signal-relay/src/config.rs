//! Configuration loading for signal-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`). Every
//! section and field is optional; an empty file yields [`Config::default`].

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides `auth.api_key`.
pub const API_KEY_ENV: &str = "SIGNAL_RELAY_API_KEY";

/// Root configuration for signal-relay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Shared-secret authentication.
    pub auth: AuthConfig,
    /// Rate limiting and capacity configuration.
    pub limits: LimitsConfig,
    /// Pending queue bounds.
    pub queue: QueueConfig,
    /// Identity directory retention.
    pub directory: DirectoryConfig,
    /// Cleanup task configuration.
    pub cleanup: CleanupConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP / WebSocket listener (default: 0.0.0.0:8787).
    pub bind_address: String,
    /// Enable metrics endpoint (default: true).
    pub metrics_enabled: bool,
}

/// Shared-secret authentication configuration.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Value expected in the `X-API-Key` header.
    ///
    /// When unset every authenticated route answers with a configuration
    /// error.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Rate limiting and capacity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Signaling requests allowed per sending identity per minute (default: 600).
    pub signals_per_minute: u32,
    /// Channel opens allowed per identity per minute (default: 30).
    pub connections_per_minute: u32,
    /// Signaling requests allowed per second across all clients (default: 1000).
    pub global_requests_per_second: u32,
    /// Maximum simultaneously open channels (default: 10000).
    /// Soft cap: concurrent opens can overshoot it by the number of racers.
    pub max_concurrent_sessions: usize,
    /// Maximum payload size for offer/answer/candidate in bytes (default: 64KB).
    pub max_payload_bytes: usize,
    /// Live capacity of each channel's outbound buffer (default: 256).
    /// Queued messages flushed on open come on top of this. A full buffer
    /// fails the send instead of stalling the router.
    pub outbound_buffer: usize,
}

/// Pending queue bounds.
///
/// Zero means "no limit", matching an unbounded in-memory queue.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum queued messages per identity; the oldest is evicted beyond it.
    pub max_per_identity: usize,
    /// Seconds a queued message stays deliverable.
    pub ttl_secs: u64,
}

impl QueueConfig {
    /// Per-identity capacity, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        (self.max_per_identity > 0).then_some(self.max_per_identity)
    }

    /// Message time-to-live, if bounded.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

/// Identity directory retention.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Offline records not seen for this many seconds are reaped (0 = never).
    pub stale_after_secs: u64,
}

impl DirectoryConfig {
    /// Age after which an offline record is reaped, if enabled.
    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_after_secs > 0).then(|| Duration::from_secs(self.stale_after_secs))
    }
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 60).
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    pub enabled: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8787".to_string()
}

fn default_signals_per_minute() -> u32 {
    600
}

fn default_connections_per_minute() -> u32 {
    30
}

fn default_global_requests_per_second() -> u32 {
    1000
}

fn default_max_concurrent_sessions() -> usize {
    10_000
}

fn default_max_payload_bytes() -> usize {
    64 * 1024 // 64KB
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            metrics_enabled: true,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            signals_per_minute: default_signals_per_minute(),
            connections_per_minute: default_connections_per_minute(),
            global_requests_per_second: default_global_requests_per_second(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            max_payload_bytes: default_max_payload_bytes(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides (currently only the shared secret).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.auth.api_key = Some(key);
            }
        }
        self
    }

    /// Reject values that would disable a limiter or the outbound channel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        let checks = [
            ("limits.signals_per_minute", limits.signals_per_minute as usize),
            ("limits.connections_per_minute", limits.connections_per_minute as usize),
            (
                "limits.global_requests_per_second",
                limits.global_requests_per_second as usize,
            ),
            ("limits.max_concurrent_sessions", limits.max_concurrent_sessions),
            ("limits.outbound_buffer", limits.outbound_buffer),
            ("cleanup.interval_secs", self.cleanup.interval_secs as usize),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:8787");
        assert_eq!(config.limits.max_payload_bytes, 64 * 1024);
        assert_eq!(config.limits.outbound_buffer, 256);
        assert!(config.auth.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_file_equals_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8787");
        assert_eq!(config.cleanup.interval_secs, 60);
        assert!(config.cleanup.enabled);
        assert!(config.queue.capacity().is_none());
        assert!(config.queue.ttl().is_none());
        assert!(config.directory.stale_after().is_none());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
bind_address = "127.0.0.1:5000"
metrics_enabled = false

[auth]
api_key = "s3cret"

[limits]
signals_per_minute = 5
max_payload_bytes = 1024

[queue]
max_per_identity = 16
ttl_secs = 300

[directory]
stale_after_secs = 86400

[cleanup]
interval_secs = 1800
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:5000");
        assert!(!config.server.metrics_enabled);
        assert_eq!(config.auth.api_key.as_deref(), Some("s3cret"));
        assert_eq!(config.limits.signals_per_minute, 5);
        assert_eq!(config.limits.max_payload_bytes, 1024);
        // untouched fields keep defaults
        assert_eq!(config.limits.connections_per_minute, 30);
        assert_eq!(config.queue.capacity(), Some(16));
        assert_eq!(config.queue.ttl(), Some(Duration::from_secs(300)));
        assert_eq!(
            config.directory.stale_after(),
            Some(Duration::from_secs(86400))
        );
        assert_eq!(config.cleanup.interval_secs, 1800);
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let mut config = Config::default();
        config.limits.signals_per_minute = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("limits.signals_per_minute"));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\noutbound_buffer = 0").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "limits.outbound_buffer", .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind_address = \"127.0.0.1:1\"").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:1");
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let auth = AuthConfig {
            api_key: Some("hunter2".into()),
        };
        let debug = format!("{:?}", auth);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("redacted"));
    }
}
