//! Process-local match store, used when no database is configured and in tests.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use super::{HistoryFilter, MatchStore, select_active, select_history};
use crate::dao::{
    models::MatchEntity,
    storage::{StorageError, StorageResult},
};

/// [`MatchStore`] keeping every record in a concurrent map.
#[derive(Clone, Default)]
pub struct InMemoryMatchStore {
    matches: Arc<DashMap<Uuid, MatchEntity>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, entity: MatchEntity) -> StorageResult<()> {
        match self.matches.entry(entity.id) {
            Entry::Occupied(_) => Err(StorageError::conflict(entity.id, 0)),
            Entry::Vacant(slot) => {
                slot.insert(entity);
                Ok(())
            }
        }
    }

    fn update(&self, entity: MatchEntity, expected_version: u64) -> StorageResult<()> {
        let id = entity.id;
        let Some(mut stored) = self.matches.get_mut(&id) else {
            return Err(StorageError::conflict(id, expected_version));
        };
        if stored.version != expected_version {
            return Err(StorageError::conflict(id, expected_version));
        }
        *stored = entity;
        Ok(())
    }
}

impl MatchStore for InMemoryMatchStore {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.insert(entity);
        Box::pin(async move { result })
    }

    fn update_match(
        &self,
        entity: MatchEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update(entity, expected_version);
        Box::pin(async move { result })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let found = self.matches.get(&id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn find_match_by_challenge(
        &self,
        challenge_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let found = self
            .matches
            .iter()
            .find(|entry| entry.challenge_id() == Some(challenge_id))
            .map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_completed(
        &self,
        filter: HistoryFilter,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let entities: Vec<MatchEntity> = self
            .matches
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Box::pin(async move { Ok(select_history(entities, filter, limit)) })
    }

    fn list_active(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let entities: Vec<MatchEntity> = self
            .matches
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Box::pin(async move { Ok(select_active(entities, user_id)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::{
        dto::caller::user_participant,
        state::tennis::{MatchFormat, MatchOrigin, MatchStatus, PerSide, TennisMatch},
    };

    fn guest_entity() -> MatchEntity {
        TennisMatch::guest(MatchFormat::Singles, vec!["Ana".into(), "Bea".into()]).into()
    }

    #[tokio::test]
    async fn update_rejects_stale_versions() {
        let store = InMemoryMatchStore::new();
        let entity = guest_entity();
        store.insert_match(entity.clone()).await.unwrap();

        let mut next = entity.clone();
        next.version = 1;
        next.player1_points = 1;
        store.update_match(next.clone(), 0).await.unwrap();

        let mut stale = entity.clone();
        stale.version = 1;
        stale.player2_points = 1;
        let err = store.update_match(stale, 0).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { expected: 0, .. }));

        let stored = store.find_match(entity.id).await.unwrap().unwrap();
        assert_eq!(stored, next);
    }

    #[tokio::test]
    async fn insert_refuses_duplicate_ids() {
        let store = InMemoryMatchStore::new();
        let entity = guest_entity();
        store.insert_match(entity.clone()).await.unwrap();
        assert!(store.insert_match(entity).await.is_err());
    }

    #[tokio::test]
    async fn history_lists_completed_guest_matches_newest_first() {
        let store = InMemoryMatchStore::new();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        let mut ids = Vec::new();
        for offset in 0..3 {
            let mut record =
                TennisMatch::guest(MatchFormat::Singles, vec!["Ana".into(), "Bea".into()]);
            record.status = MatchStatus::Completed;
            record.ended_at = Some(base + Duration::from_secs(offset));
            ids.push(record.id);
            store.insert_match(record.into()).await.unwrap();
        }
        store.insert_match(guest_entity()).await.unwrap();

        let history = store.list_completed(HistoryFilter::Guest, 2).await.unwrap();

        let listed: Vec<Uuid> = history.iter().map(|entity| entity.id).collect();
        assert_eq!(listed, vec![ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn active_listing_keeps_unfinished_matches_of_the_user() {
        let store = InMemoryMatchStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        let mut ids = Vec::new();
        for (offset, status) in [
            (0, MatchStatus::NotStarted),
            (1, MatchStatus::InProgress),
            (2, MatchStatus::Completed),
        ] {
            let mut record = TennisMatch::new(
                MatchOrigin::Direct,
                MatchFormat::Singles,
                PerSide::new(
                    user_participant(alice, Some("Alice")),
                    user_participant(bob, Some("Bob")),
                ),
            );
            record.status = status;
            record.created_at = base + Duration::from_secs(offset);
            ids.push(record.id);
            store.insert_match(record.into()).await.unwrap();
        }
        store.insert_match(guest_entity()).await.unwrap();

        let listed: Vec<Uuid> = store
            .list_active(bob)
            .await
            .unwrap()
            .iter()
            .map(|entity| entity.id)
            .collect();
        assert_eq!(listed, vec![ids[1], ids[0]]);
        assert!(store.list_active(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
