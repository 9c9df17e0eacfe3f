//! User record store trait for pluggable persistence backends.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{PresencePatch, UserId, UserPresenceRecord};

/// Trait for the backend that holds one presence record per user.
///
/// The presence engine treats each record as single-writer (the user's
/// own agent) and multi-reader (any observer). Writes are partial
/// updates; the backend must apply only the fields set in the patch and
/// must not require a read-modify-write round trip.
#[async_trait]
pub trait UserRecordStore: Send + Sync + 'static {
    /// Read a single record. `None` if the user has no record yet.
    async fn read(&self, user_id: UserId) -> AppResult<Option<UserPresenceRecord>>;

    /// Batch-read records for a set of users. IDs without a record are
    /// simply absent from the result; order is not guaranteed.
    async fn read_many(&self, user_ids: &[UserId]) -> AppResult<Vec<UserPresenceRecord>>;

    /// Apply a partial update to a user's record, creating the record
    /// if it does not exist.
    async fn write(&self, user_id: UserId, patch: PresencePatch) -> AppResult<()>;
}
