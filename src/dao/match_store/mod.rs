#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
#[cfg(test)]
pub(crate) mod rival;

use crate::dao::models::{MatchEntity, MatchOriginEntity, MatchStatusEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Which completed matches a history listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter {
    /// Guest quick matches.
    Guest,
    /// Matches where the user played on either side.
    User(Uuid),
}

impl HistoryFilter {
    /// Whether a completed match belongs to this listing.
    pub fn accepts(&self, entity: &MatchEntity) -> bool {
        if entity.status != MatchStatusEntity::Completed {
            return false;
        }
        match self {
            HistoryFilter::Guest => entity.origin == MatchOriginEntity::Guest,
            HistoryFilter::User(user_id) => entity.user_ids().any(|id| id == *user_id),
        }
    }
}

/// Abstraction over the persistence layer for match records.
pub trait MatchStore: Send + Sync {
    /// Persist a brand-new match.
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace a match if the stored version still equals `expected_version`.
    fn update_match(
        &self,
        entity: MatchEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn find_match_by_challenge(
        &self,
        challenge_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Completed matches accepted by `filter`, most recently ended first.
    fn list_completed(
        &self,
        filter: HistoryFilter,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    /// Unfinished matches the user plays on either side, most recently created first.
    fn list_active(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Filter, order and truncate a history listing for backends that cannot query it natively.
pub(crate) fn select_history(
    entities: impl IntoIterator<Item = MatchEntity>,
    filter: HistoryFilter,
    limit: usize,
) -> Vec<MatchEntity> {
    let mut selected: Vec<MatchEntity> = entities
        .into_iter()
        .filter(|entity| filter.accepts(entity) && entity.ended_at.is_some())
        .collect();
    selected.sort_by(|left, right| right.ended_at.cmp(&left.ended_at));
    selected.truncate(limit);
    selected
}

/// Unfinished matches of `user_id`, newest first, for backends that cannot query them natively.
pub(crate) fn select_active(
    entities: impl IntoIterator<Item = MatchEntity>,
    user_id: Uuid,
) -> Vec<MatchEntity> {
    let mut selected: Vec<MatchEntity> = entities
        .into_iter()
        .filter(|entity| {
            entity.status != MatchStatusEntity::Completed
                && entity.user_ids().any(|id| id == user_id)
        })
        .collect();
    selected.sort_by(|left, right| right.created_at.cmp(&left.created_at));
    selected
}
