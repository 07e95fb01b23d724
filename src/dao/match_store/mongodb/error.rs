use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert match `{id}`")]
    InsertMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("match `{id}` collides with an existing document")]
    DuplicateMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update match `{id}`")]
    UpdateMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load match `{key}`")]
    LoadMatch {
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list matches")]
    ListMatches {
        #[source]
        source: MongoError,
    },
    #[error("match `{id}` version {version} does not fit a BSON integer")]
    VersionOverflow { id: Uuid, version: u64 },
    #[error("stored match document `{id}` is malformed: {reason}")]
    CorruptDocument { id: String, reason: &'static str },
}
