//! Identity directory for signal-relay.
//!
//! Stores registered profiles and key bundles. The relay core only reads
//! records for presence and stamps `lastSeen` when a channel closes.

mod memory;

pub use memory::MemoryDirectory;

use crate::error::DirectoryError;
use async_trait::async_trait;
use signal_types::api::UserProfile;
use signal_types::{Identity, Timestamp};

/// Trait for directory backends.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Insert or overwrite the record for `profile.user_id`.
    async fn upsert(&self, profile: UserProfile) -> Result<(), DirectoryError>;

    /// Get the record for an identity.
    async fn get(&self, identity: &Identity) -> Result<Option<UserProfile>, DirectoryError>;

    /// Set `lastSeen` for an identity.
    ///
    /// Returns `false` when no record exists (nothing is created).
    async fn touch_last_seen(
        &self,
        identity: &Identity,
        at: Timestamp,
    ) -> Result<bool, DirectoryError>;

    /// Remove records last seen before `cutoff`, skipping identities for
    /// which `keep` returns `true`.
    ///
    /// Returns the number of records removed.
    async fn reap_stale(
        &self,
        cutoff: Timestamp,
        keep: &(dyn for<'a> Fn(&'a Identity) -> bool + Sync),
    ) -> Result<u64, DirectoryError>;

    /// Number of records.
    async fn count(&self) -> Result<usize, DirectoryError>;
}
