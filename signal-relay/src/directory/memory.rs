//! In-memory directory backend.

use super::Directory;
use crate::error::DirectoryError;
use async_trait::async_trait;
use dashmap::DashMap;
use signal_types::api::UserProfile;
use signal_types::{Identity, Timestamp};

/// DashMap-backed directory. Contents do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    records: DashMap<Identity, UserProfile>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn upsert(&self, profile: UserProfile) -> Result<(), DirectoryError> {
        self.records.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn get(&self, identity: &Identity) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.records.get(identity).map(|r| r.value().clone()))
    }

    async fn touch_last_seen(
        &self,
        identity: &Identity,
        at: Timestamp,
    ) -> Result<bool, DirectoryError> {
        match self.records.get_mut(identity) {
            Some(mut record) => {
                record.last_seen = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reap_stale(
        &self,
        cutoff: Timestamp,
        keep: &(dyn for<'a> Fn(&'a Identity) -> bool + Sync),
    ) -> Result<u64, DirectoryError> {
        let mut removed = 0u64;
        self.records.retain(|identity, record| {
            let stale = record.last_seen < cutoff && !keep(identity);
            if stale {
                removed += 1;
            }
            !stale
        });
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, DirectoryError> {
        Ok(self.records.len())
    }
}
