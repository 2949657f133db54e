use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    BadgeEntity, ControlIntervalEntity, GameEntity, ScanRecordEntity, SequenceProgressEntity,
    SequenceScanEntity, SessionEntity, SessionStatus, StationEntity, TeamEntity,
};
use crate::state::game::GameRules;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    color: String,
    updated_at: DateTime,
}

impl From<TeamEntity> for MongoTeamDocument {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoTeamDocument> for TeamEntity {
    fn from(value: MongoTeamDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBadgeDocument {
    #[serde(rename = "_id")]
    rfid_uid: String,
    player_name: Option<String>,
    team_id: Option<Uuid>,
    created_at: DateTime,
}

impl From<BadgeEntity> for MongoBadgeDocument {
    fn from(value: BadgeEntity) -> Self {
        Self {
            rfid_uid: value.rfid_uid,
            player_name: value.player_name,
            team_id: value.team_id,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoBadgeDocument> for BadgeEntity {
    fn from(value: MongoBadgeDocument) -> Self {
        Self {
            rfid_uid: value.rfid_uid,
            player_name: value.player_name,
            team_id: value.team_id,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStationDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    location: Option<String>,
    is_active: bool,
}

impl From<StationEntity> for MongoStationDocument {
    fn from(value: StationEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            location: value.location,
            is_active: value.is_active,
        }
    }
}

impl From<MongoStationDocument> for StationEntity {
    fn from(value: MongoStationDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            location: value.location,
            is_active: value.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    rules: GameRules,
    created_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            rules: value.rules,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            rules: value.rules,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    game_id: Uuid,
    game_name: String,
    rules: GameRules,
    status: SessionStatus,
    started_at: DateTime,
    ended_at: Option<DateTime>,
    winner_team_id: Option<Uuid>,
    station_ids: Vec<Uuid>,
    team_ids: Vec<Uuid>,
    control_intervals: Vec<MongoControlInterval>,
    sequence_progress: Vec<MongoSequenceProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoControlInterval {
    station_id: Uuid,
    team_id: Uuid,
    controlled_at: DateTime,
    duration_secs: u64,
    is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoSequenceProgress {
    team_id: Uuid,
    idx: u64,
    points: u32,
    streak_count: u32,
    window_expires_at: Option<DateTime>,
    visited: Vec<Uuid>,
    last_update: DateTime,
}

impl From<ControlIntervalEntity> for MongoControlInterval {
    fn from(value: ControlIntervalEntity) -> Self {
        Self {
            station_id: value.station_id,
            team_id: value.team_id,
            controlled_at: DateTime::from_system_time(value.controlled_at),
            duration_secs: value.duration_secs,
            is_current: value.is_current,
        }
    }
}

impl From<SequenceProgressEntity> for MongoSequenceProgress {
    fn from(value: SequenceProgressEntity) -> Self {
        Self {
            team_id: value.team_id,
            idx: value.idx as u64,
            points: value.points,
            streak_count: value.streak_count,
            window_expires_at: value.window_expires_at.map(DateTime::from_system_time),
            visited: value.visited,
            last_update: DateTime::from_system_time(value.last_update),
        }
    }
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            game_name: value.game_name,
            rules: value.rules,
            status: value.status,
            started_at: DateTime::from_system_time(value.started_at),
            ended_at: value.ended_at.map(DateTime::from_system_time),
            winner_team_id: value.winner_team_id,
            station_ids: value.station_ids,
            team_ids: value.team_ids,
            control_intervals: value.control_intervals.into_iter().map(Into::into).collect(),
            sequence_progress: value.sequence_progress.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScanDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    session_id: Uuid,
    rfid_uid: String,
    station_id: Uuid,
    team_id: Option<Uuid>,
    outcome: String,
    at: DateTime,
}

impl From<ScanRecordEntity> for MongoScanDocument {
    fn from(value: ScanRecordEntity) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: value.session_id,
            rfid_uid: value.rfid_uid,
            station_id: value.station_id,
            team_id: value.team_id,
            outcome: value.outcome,
            at: DateTime::from_system_time(value.at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSequenceScanDocument {
    #[serde(rename = "_id")]
    scan_id: String,
    session_id: Uuid,
    team_id: Uuid,
    station_id: Uuid,
    outcome: String,
    at: DateTime,
}

impl From<SequenceScanEntity> for MongoSequenceScanDocument {
    fn from(value: SequenceScanEntity) -> Self {
        Self {
            scan_id: value.scan_id,
            session_id: value.session_id,
            team_id: value.team_id,
            station_id: value.station_id,
            outcome: value.outcome,
            at: DateTime::from_system_time(value.at),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

pub fn doc_str_id(id: &str) -> Document {
    doc! {"_id": id}
}
