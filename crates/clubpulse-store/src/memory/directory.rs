//! In-memory club membership directory.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use clubpulse_core::result::AppResult;
use clubpulse_core::traits::ClubMembershipDirectory;
use clubpulse_core::types::{ClubId, UserId};

/// In-memory [`ClubMembershipDirectory`].
///
/// Clones share the same underlying map. Member order is preserved as
/// set, so snapshots derived from it are stable.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    members: Arc<DashMap<ClubId, Vec<UserId>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full member list of a club.
    pub fn set_members(&self, club_id: ClubId, member_ids: Vec<UserId>) {
        self.members.insert(club_id, member_ids);
    }

    /// Append a member to a club if not already present.
    pub fn add_member(&self, club_id: ClubId, user_id: UserId) {
        let mut entry = self.members.entry(club_id).or_default();
        if !entry.contains(&user_id) {
            entry.push(user_id);
        }
    }

    /// Remove a member from a club. No-op if absent.
    pub fn remove_member(&self, club_id: ClubId, user_id: UserId) {
        if let Some(mut entry) = self.members.get_mut(&club_id) {
            entry.retain(|id| *id != user_id);
        }
    }
}

#[async_trait]
impl ClubMembershipDirectory for MemoryDirectory {
    async fn list_member_ids(&self, club_id: ClubId) -> AppResult<Vec<UserId>> {
        Ok(self
            .members
            .get(&club_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}
