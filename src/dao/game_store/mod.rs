#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    BadgeEntity, GameEntity, ScanRecordEntity, SequenceScanEntity, SessionEntity, StationEntity,
    TeamEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for the roster, sessions and scan
/// audit logs.
///
/// The in-memory state is authoritative while a session runs; the store
/// mirrors roster changes, session history and scan logs so they survive a
/// restart.
pub trait GameStore: Send + Sync {
    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;
    fn save_badge(&self, badge: BadgeEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_badge(&self, rfid_uid: String) -> BoxFuture<'static, StorageResult<()>>;
    fn list_badges(&self) -> BoxFuture<'static, StorageResult<Vec<BadgeEntity>>>;
    fn save_station(&self, station: StationEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_station(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn list_stations(&self) -> BoxFuture<'static, StorageResult<Vec<StationEntity>>>;
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn append_scan(&self, scan: ScanRecordEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn append_sequence_scan(
        &self,
        scan: SequenceScanEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
