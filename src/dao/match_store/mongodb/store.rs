use std::{sync::Arc, time::Duration};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
};
use tokio::{sync::RwLock, time::sleep};
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoMatchDocument, doc_id, versioned_doc_id},
};
use crate::dao::{
    match_store::{HistoryFilter, MatchStore},
    models::MatchEntity,
    storage::{StorageError, StorageResult},
};

const MATCH_COLLECTION_NAME: &str = "matches";

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_INITIAL_DELAY: Duration = Duration::from_millis(250);
const CONNECT_MAX_DELAY: Duration = Duration::from_secs(5);

const DUPLICATE_KEY_CODE: i32 = 11000;

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY_CODE
    )
}

#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

/// Build a client and wait until the server answers a ping, doubling the delay between tries.
async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<Database> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = CONNECT_INITIAL_DELAY;
    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok(database),
            Err(source) => {
                attempts += 1;
                if attempts >= CONNECT_ATTEMPTS {
                    return Err(MongoDaoError::InitialPing { attempts, source });
                }
                warn!(attempts, delay_ms = delay.as_millis() as u64, "MongoDB ping failed, retrying");
                sleep(delay).await;
                delay = (delay * 2).min(CONNECT_MAX_DELAY);
            }
        }
    }
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let indexes = [
            (
                "challenge_id",
                doc! {"challenge_id": 1},
                IndexOptions::builder()
                    .name(Some("match_challenge_idx".to_owned()))
                    .unique(Some(true))
                    .partial_filter_expression(Some(doc! {"challenge_id": {"$type": "string"}}))
                    .build(),
            ),
            (
                "status,ended_at",
                doc! {"status": 1, "ended_at": -1},
                IndexOptions::builder()
                    .name(Some("match_history_idx".to_owned()))
                    .build(),
            ),
            (
                "user_ids",
                doc! {"user_ids": 1},
                IndexOptions::builder()
                    .name(Some("match_user_idx".to_owned()))
                    .build(),
            ),
        ];

        for (index, keys, options) in indexes {
            let model = IndexModel::builder().keys(keys).options(options).build();
            collection
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: MATCH_COLLECTION_NAME,
                    index,
                    source,
                })?;
        }
        Ok(())
    }

    async fn collection(&self) -> Collection<MongoMatchDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn insert_match(&self, entity: MatchEntity) -> MongoResult<()> {
        let id = entity.id;
        let document = MongoMatchDocument::try_from(entity)?;
        self.collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::DuplicateMatch { id, source }
                } else {
                    MongoDaoError::InsertMatch { id, source }
                }
            })?;
        Ok(())
    }

    /// Returns `false` when no document carried `expected_version`.
    async fn update_match(&self, entity: MatchEntity, expected_version: u64) -> MongoResult<bool> {
        let id = entity.id;
        let filter = versioned_doc_id(id, expected_version)?;
        let document = MongoMatchDocument::try_from(entity)?;
        let result = self
            .collection()
            .await
            .replace_one(filter, &document)
            .await
            .map_err(|source| MongoDaoError::UpdateMatch { id, source })?;
        Ok(result.matched_count > 0)
    }

    async fn find_one(&self, filter: Document, key: String) -> MongoResult<Option<MatchEntity>> {
        let document = self
            .collection()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::LoadMatch { key, source })?;
        document.map(MatchEntity::try_from).transpose()
    }

    async fn list_completed(
        &self,
        filter: HistoryFilter,
        limit: usize,
    ) -> MongoResult<Vec<MatchEntity>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = match filter {
            HistoryFilter::Guest => doc! {
                "status": "completed",
                "origin.kind": "guest",
                "ended_at": {"$ne": null},
            },
            HistoryFilter::User(user_id) => doc! {
                "status": "completed",
                "user_ids": user_id.to_string(),
                "ended_at": {"$ne": null},
            },
        };

        let documents: Vec<MongoMatchDocument> = self
            .collection()
            .await
            .find(query)
            .sort(doc! {"ended_at": -1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?;

        documents.into_iter().map(MatchEntity::try_from).collect()
    }

    async fn list_active(&self, user_id: Uuid) -> MongoResult<Vec<MatchEntity>> {
        let query = doc! {
            "status": {"$in": ["not_started", "in_progress"]},
            "user_ids": user_id.to_string(),
        };

        let documents: Vec<MongoMatchDocument> = self
            .collection()
            .await
            .find(query)
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?;

        documents.into_iter().map(MatchEntity::try_from).collect()
    }
}

impl MatchStore for MongoMatchStore {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_match(entity).await.map_err(Into::into) })
    }

    fn update_match(
        &self,
        entity: MatchEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = entity.id;
            if store.update_match(entity, expected_version).await? {
                Ok(())
            } else {
                Err(StorageError::conflict(id, expected_version))
            }
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one(doc_id(id), id.to_string())
                .await
                .map_err(Into::into)
        })
    }

    fn find_match_by_challenge(
        &self,
        challenge_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one(
                    doc! {"challenge_id": challenge_id.to_string()},
                    format!("challenge {challenge_id}"),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn list_completed(
        &self,
        filter: HistoryFilter,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_completed(filter, limit).await.map_err(Into::into) })
    }

    fn list_active(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_active(user_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
