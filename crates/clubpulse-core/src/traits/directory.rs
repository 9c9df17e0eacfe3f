//! Club membership directory trait.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{ClubId, UserId};

/// Trait for enumerating the members of a club.
///
/// Membership is assumed to change rarely; the presence engine reads it
/// once per watch and is told about changes externally via a refresh,
/// it never polls the directory.
#[async_trait]
pub trait ClubMembershipDirectory: Send + Sync + 'static {
    /// All member IDs of a club. Unknown clubs yield an empty list,
    /// not an error.
    async fn list_member_ids(&self, club_id: ClubId) -> AppResult<Vec<UserId>>;
}
