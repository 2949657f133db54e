use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoBadgeDocument, MongoGameDocument, MongoScanDocument, MongoSequenceScanDocument,
        MongoSessionDocument, MongoStationDocument, MongoTeamDocument, doc_id, doc_str_id,
    },
};
use crate::dao::{
    game_store::GameStore,
    models::{
        BadgeEntity, GameEntity, ScanRecordEntity, SequenceScanEntity, SessionEntity,
        StationEntity, TeamEntity,
    },
    storage::StorageResult,
};

const TEAM_COLLECTION: &str = "teams";
const BADGE_COLLECTION: &str = "badges";
const STATION_COLLECTION: &str = "stations";
const GAME_COLLECTION: &str = "games";
const SESSION_COLLECTION: &str = "sessions";
const SCAN_COLLECTION: &str = "scans";
const SEQUENCE_SCAN_COLLECTION: &str = "sequence_scans";

/// MongoDB-backed [`GameStore`] implementation.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive for the lifetime of the connection even though every
    // operation goes through the database handle.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Every collection keys its documents by a natural _id, so the extra
        // indexes only speed up history queries.
        let plans: [(&'static str, &'static str, mongodb::bson::Document); 3] = [
            ("session_status_idx", SESSION_COLLECTION, doc! {"status": 1}),
            ("scan_session_idx", SCAN_COLLECTION, doc! {"session_id": 1}),
            (
                "sequence_scan_session_idx",
                SEQUENCE_SCAN_COLLECTION,
                doc! {"session_id": 1},
            ),
        ];

        for (name, collection_name, keys) in plans {
            let collection = database.collection::<mongodb::bson::Document>(collection_name);
            let index = mongodb::IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();

            collection
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn save_team(&self, team: TeamEntity) -> MongoResult<()> {
        let id = team.id;
        let document: MongoTeamDocument = team.into();
        let collection = self.collection::<MongoTeamDocument>(TEAM_COLLECTION).await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDocument {
                collection: TEAM_COLLECTION,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn delete_team(&self, id: Uuid) -> MongoResult<()> {
        let collection = self.collection::<MongoTeamDocument>(TEAM_COLLECTION).await;
        collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteDocument {
                collection: TEAM_COLLECTION,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn list_teams(&self) -> MongoResult<Vec<TeamEntity>> {
        let collection = self.collection::<MongoTeamDocument>(TEAM_COLLECTION).await;
        let documents: Vec<MongoTeamDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListCollection {
                collection: TEAM_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListCollection {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_badge(&self, badge: BadgeEntity) -> MongoResult<()> {
        let uid = badge.rfid_uid.clone();
        let document: MongoBadgeDocument = badge.into();
        let collection = self
            .collection::<MongoBadgeDocument>(BADGE_COLLECTION)
            .await;
        collection
            .replace_one(doc_str_id(&uid), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDocument {
                collection: BADGE_COLLECTION,
                id: uid,
                source,
            })?;
        Ok(())
    }

    async fn delete_badge(&self, rfid_uid: String) -> MongoResult<()> {
        let collection = self
            .collection::<MongoBadgeDocument>(BADGE_COLLECTION)
            .await;
        collection
            .delete_one(doc_str_id(&rfid_uid))
            .await
            .map_err(|source| MongoDaoError::DeleteDocument {
                collection: BADGE_COLLECTION,
                id: rfid_uid,
                source,
            })?;
        Ok(())
    }

    async fn list_badges(&self) -> MongoResult<Vec<BadgeEntity>> {
        let collection = self
            .collection::<MongoBadgeDocument>(BADGE_COLLECTION)
            .await;
        let documents: Vec<MongoBadgeDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListCollection {
                collection: BADGE_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListCollection {
                collection: BADGE_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_station(&self, station: StationEntity) -> MongoResult<()> {
        let id = station.id;
        let document: MongoStationDocument = station.into();
        let collection = self
            .collection::<MongoStationDocument>(STATION_COLLECTION)
            .await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDocument {
                collection: STATION_COLLECTION,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn delete_station(&self, id: Uuid) -> MongoResult<()> {
        let collection = self
            .collection::<MongoStationDocument>(STATION_COLLECTION)
            .await;
        collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteDocument {
                collection: STATION_COLLECTION,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn list_stations(&self) -> MongoResult<Vec<StationEntity>> {
        let collection = self
            .collection::<MongoStationDocument>(STATION_COLLECTION)
            .await;
        let documents: Vec<MongoStationDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListCollection {
                collection: STATION_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListCollection {
                collection: STATION_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        let collection = self.collection::<MongoGameDocument>(GAME_COLLECTION).await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDocument {
                collection: GAME_COLLECTION,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn delete_game(&self, id: Uuid) -> MongoResult<()> {
        let collection = self.collection::<MongoGameDocument>(GAME_COLLECTION).await;
        collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteDocument {
                collection: GAME_COLLECTION,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn list_games(&self) -> MongoResult<Vec<GameEntity>> {
        let collection = self.collection::<MongoGameDocument>(GAME_COLLECTION).await;
        let documents: Vec<MongoGameDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListCollection {
                collection: GAME_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListCollection {
                collection: GAME_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id;
        let document: MongoSessionDocument = session.into();
        let collection = self
            .collection::<MongoSessionDocument>(SESSION_COLLECTION)
            .await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDocument {
                collection: SESSION_COLLECTION,
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn append_scan(&self, scan: ScanRecordEntity) -> MongoResult<()> {
        let document: MongoScanDocument = scan.into();
        let collection = self.collection::<MongoScanDocument>(SCAN_COLLECTION).await;
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendDocument {
                collection: SCAN_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn append_sequence_scan(&self, scan: SequenceScanEntity) -> MongoResult<()> {
        let scan_id = scan.scan_id.clone();
        let document: MongoSequenceScanDocument = scan.into();
        let collection = self
            .collection::<MongoSequenceScanDocument>(SEQUENCE_SCAN_COLLECTION)
            .await;
        // Keyed by scan id, so a replay delivered across a restart overwrites
        // its own row instead of failing on a duplicate key.
        collection
            .replace_one(doc_str_id(&scan_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDocument {
                collection: SEQUENCE_SCAN_COLLECTION,
                id: scan_id,
                source,
            })?;
        Ok(())
    }
}

impl GameStore for MongoGameStore {
    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_team(team).await.map_err(Into::into) })
    }

    fn delete_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_team(id).await.map_err(Into::into) })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_teams().await.map_err(Into::into) })
    }

    fn save_badge(&self, badge: BadgeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_badge(badge).await.map_err(Into::into) })
    }

    fn delete_badge(&self, rfid_uid: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_badge(rfid_uid).await.map_err(Into::into) })
    }

    fn list_badges(&self) -> BoxFuture<'static, StorageResult<Vec<BadgeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_badges().await.map_err(Into::into) })
    }

    fn save_station(&self, station: StationEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_station(station).await.map_err(Into::into) })
    }

    fn delete_station(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_station(id).await.map_err(Into::into) })
    }

    fn list_stations(&self) -> BoxFuture<'static, StorageResult<Vec<StationEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_stations().await.map_err(Into::into) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await.map_err(Into::into) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game(id).await.map_err(Into::into) })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_games().await.map_err(Into::into) })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_session(session).await.map_err(Into::into) })
    }

    fn append_scan(&self, scan: ScanRecordEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_scan(scan).await.map_err(Into::into) })
    }

    fn append_sequence_scan(
        &self,
        scan: SequenceScanEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_sequence_scan(scan).await.map_err(Into::into) })
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
