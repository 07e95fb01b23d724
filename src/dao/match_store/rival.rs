//! Store wrapper for tests that plays a second writer racing this process.

use std::sync::{
    Mutex,
    atomic::{AtomicU32, Ordering},
};

use futures::future::BoxFuture;
use uuid::Uuid;

use super::{HistoryFilter, MatchStore, memory::InMemoryMatchStore};
use crate::dao::{
    models::MatchEntity,
    storage::{StorageError, StorageResult},
};

/// Wraps an [`InMemoryMatchStore`] and lets a rival writer win the next races.
///
/// Each beaten update first stores a rival write (one more point for `player2`) and then
/// reports the version conflict the losing write would see. A pending rival insert lands
/// just before ours and makes ours collide.
#[derive(Default)]
pub(crate) struct RivalStore {
    inner: InMemoryMatchStore,
    beaten_updates: AtomicU32,
    rival_insert: Mutex<Option<MatchEntity>>,
}

impl RivalStore {
    pub(crate) fn new(inner: InMemoryMatchStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub(crate) fn beat_updates(self, count: u32) -> Self {
        self.beaten_updates.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn beat_insert(self, entity: MatchEntity) -> Self {
        if let Ok(mut slot) = self.rival_insert.lock() {
            *slot = Some(entity);
        }
        self
    }

    fn take_update_race(&self) -> bool {
        self.beaten_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn take_insert_race(&self) -> Option<MatchEntity> {
        self.rival_insert.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl MatchStore for RivalStore {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let rival = self.take_insert_race();
        Box::pin(async move {
            match rival {
                Some(rival) => {
                    inner.insert_match(rival).await?;
                    Err(StorageError::conflict(entity.id, entity.version))
                }
                None => inner.insert_match(entity).await,
            }
        })
    }

    fn update_match(
        &self,
        entity: MatchEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let raced = self.take_update_race();
        Box::pin(async move {
            if raced {
                let id = entity.id;
                if let Some(mut stored) = inner.find_match(id).await? {
                    let version = stored.version;
                    stored.version += 1;
                    stored.player2_points += 1;
                    inner.update_match(stored, version).await?;
                }
            }
            inner.update_match(entity, expected_version).await
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        self.inner.find_match(id)
    }

    fn find_match_by_challenge(
        &self,
        challenge_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        self.inner.find_match_by_challenge(challenge_id)
    }

    fn list_completed(
        &self,
        filter: HistoryFilter,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        self.inner.list_completed(filter, limit)
    }

    fn list_active(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        self.inner.list_active(user_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
