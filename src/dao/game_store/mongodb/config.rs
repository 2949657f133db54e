use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Default connection string used when `MONGO_URI` is not set.
const DEFAULT_URI: &str = "mongodb://localhost:27017";
/// Default database name used when `MONGO_DB` is not set.
const DEFAULT_DATABASE: &str = "outpost";

/// Parsed MongoDB client options plus the target database name.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection URI, optionally overriding the database name.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }

    /// Build the configuration from `MONGO_URI` and `MONGO_DB`, falling back
    /// to a local instance when either variable is absent.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| DEFAULT_URI.to_owned());
        let db = std::env::var("MONGO_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_owned());
        Self::from_uri(&uri, Some(&db)).await
    }
}
