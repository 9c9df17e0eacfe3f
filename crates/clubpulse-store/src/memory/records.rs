//! In-memory user record store backed by a DashMap.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use clubpulse_core::result::AppResult;
use clubpulse_core::traits::UserRecordStore;
use clubpulse_core::types::{PresencePatch, UserId, UserPresenceRecord};

/// In-memory [`UserRecordStore`].
///
/// Clones share the same underlying map, so a store handed to several
/// engine components behaves like one shared backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<DashMap<UserId, UserPresenceRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the profile fields of a user's record, creating it
    /// (offline) if absent. Profile data is owned by the user service
    /// in production; the sandbox and tests seed it here.
    pub fn seed_profile(
        &self,
        user_id: UserId,
        display_name: impl Into<String>,
        photo_url: Option<String>,
    ) {
        let display_name = display_name.into();
        self.records
            .entry(user_id)
            .and_modify(|record| {
                record.display_name = Some(display_name.clone());
                record.photo_url.clone_from(&photo_url);
            })
            .or_insert_with(|| UserPresenceRecord {
                display_name: Some(display_name),
                photo_url,
                ..UserPresenceRecord::offline(user_id)
            });
    }

    /// Insert a fully formed record, replacing any existing one.
    pub fn insert_record(&self, record: UserPresenceRecord) {
        self.records.insert(record.user_id, record);
    }

    /// Synchronous lookup for assertions and sandbox output.
    pub fn get(&self, user_id: UserId) -> Option<UserPresenceRecord> {
        self.records.get(&user_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl UserRecordStore for MemoryRecordStore {
    async fn read(&self, user_id: UserId) -> AppResult<Option<UserPresenceRecord>> {
        Ok(self.records.get(&user_id).map(|entry| entry.clone()))
    }

    async fn read_many(&self, user_ids: &[UserId]) -> AppResult<Vec<UserPresenceRecord>> {
        let records = user_ids
            .iter()
            .filter_map(|user_id| self.records.get(user_id).map(|entry| entry.clone()))
            .collect();
        Ok(records)
    }

    async fn write(&self, user_id: UserId, patch: PresencePatch) -> AppResult<()> {
        trace!(user_id = %user_id, ?patch, "Applying presence patch");
        self.records
            .entry(user_id)
            .and_modify(|record| patch.apply_to(record))
            .or_insert_with(|| {
                let mut record = UserPresenceRecord::offline(user_id);
                patch.apply_to(&mut record);
                record
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn test_write_creates_record_when_absent() {
        let store = MemoryRecordStore::new();
        let user_id = UserId::new();

        store
            .write(user_id, PresencePatch::online(Utc::now()))
            .await
            .unwrap();

        let record = store.read(user_id).await.unwrap().unwrap();
        assert!(record.is_online);
        assert!(record.last_heartbeat.is_some());
    }

    #[tokio::test]
    async fn test_patch_leaves_profile_fields_alone() {
        let store = MemoryRecordStore::new();
        let user_id = UserId::new();
        store.seed_profile(user_id, "Asha", None);

        store
            .write(user_id, PresencePatch::heartbeat(Utc::now()))
            .await
            .unwrap();

        let record = store.read(user_id).await.unwrap().unwrap();
        assert_eq!(record.display_name.as_deref(), Some("Asha"));
        assert!(!record.is_online);
        assert!(record.last_heartbeat.is_some());
    }

    #[tokio::test]
    async fn test_read_many_skips_missing_ids() {
        let store = MemoryRecordStore::new();
        let known = UserId::new();
        let unknown = UserId::new();
        store.seed_profile(known, "Bram", None);

        let records = store.read_many(&[known, unknown]).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, known);
    }

    #[tokio::test]
    async fn test_clones_share_the_same_map() {
        let store = MemoryRecordStore::new();
        let clone = store.clone();
        let user_id = UserId::new();

        clone
            .write(user_id, PresencePatch::online(Utc::now()))
            .await
            .unwrap();

        assert!(store.get(user_id).is_some());
    }
}
