use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Errors raised by the MongoDB storage backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
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
    #[error("failed to save document `{id}` in `{collection}`")]
    SaveDocument {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete document `{id}` from `{collection}`")]
    DeleteDocument {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to append document to `{collection}`")]
    AppendDocument {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to list collection `{collection}`")]
    ListCollection {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
}
