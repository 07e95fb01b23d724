pub mod scoring;
pub mod tennis;

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{match_store::MatchStore, storage::StorageError},
    error::ServiceError,
    state::tennis::TennisMatch,
};

pub type SharedState = Arc<AppState>;

type LockTable = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

/// Central application state: configuration, the storage handle and per-match locks.
pub struct AppState {
    config: AppConfig,
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    degraded: watch::Sender<bool>,
    locks: LockTable,
}

/// Exclusive hold on one key of the lock table. The table entry is dropped with the last holder.
pub struct KeyLock {
    key: Uuid,
    table: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        self.guard.take();
        self.table
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            match_store: RwLock::new(None),
            degraded: degraded_tx,
            locks: Arc::new(DashMap::new()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain the current match store or fail with [`ServiceError::Degraded`].
    pub async fn require_match_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        let guard = self.match_store.read().await;
        guard.as_ref().cloned().ok_or(ServiceError::Degraded)
    }

    /// Install a match store implementation and leave degraded mode.
    pub async fn set_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag, notifying watchers only on change.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Serialize work on `key` (a match id or a challenge id) across tasks.
    pub async fn lock(&self, key: Uuid) -> KeyLock {
        let mutex = Arc::clone(&self.locks.entry(key).or_default());
        let guard = mutex.lock_owned().await;
        KeyLock {
            key,
            table: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Load a match by id.
    pub async fn load_match(&self, id: Uuid) -> Result<TennisMatch, ServiceError> {
        let store = self.require_match_store().await?;
        store
            .find_match(id)
            .await?
            .map(Into::into)
            .ok_or_else(|| match_not_found(id))
    }

    /// Persist a freshly created match.
    pub async fn insert_match(&self, record: &TennisMatch) -> Result<(), ServiceError> {
        let store = self.require_match_store().await?;
        store.insert_match(record.clone().into()).await?;
        Ok(())
    }

    /// Read-modify-write one match as a single logical transaction.
    ///
    /// `apply` runs on a copy of the stored record while the per-match lock is held; errors it
    /// returns abort the update before anything is written. Unchanged records are not written.
    /// When another process wrote in between, the update is replayed on the fresh record up to
    /// `update_retries` times.
    pub async fn update_match<T, F>(
        &self,
        id: Uuid,
        mut apply: F,
    ) -> Result<(TennisMatch, T), ServiceError>
    where
        F: FnMut(&mut TennisMatch) -> Result<T, ServiceError>,
    {
        let _lock = self.lock(id).await;
        let store = self.require_match_store().await?;
        let mut conflicts = 0;

        loop {
            let stored: TennisMatch = store
                .find_match(id)
                .await?
                .map(Into::into)
                .ok_or_else(|| match_not_found(id))?;

            let mut record = stored.clone();
            let value = apply(&mut record)?;
            if record == stored {
                debug!(match_id = %id, "update left the match unchanged");
                return Ok((record, value));
            }

            let expected = stored.version;
            record.version = expected + 1;
            record.updated_at = SystemTime::now();
            match store.update_match(record.clone().into(), expected).await {
                Ok(()) => return Ok((record, value)),
                Err(StorageError::Conflict { .. }) if conflicts < self.config.update_retries => {
                    conflicts += 1;
                    warn!(match_id = %id, conflicts, "match changed underneath; replaying update");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

pub fn match_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("match `{id}` not found"))
}
