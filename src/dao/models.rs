use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::game::GameRules;

/// Representation of a team stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name chosen for the team.
    pub name: String,
    /// Hex color assigned to the team (e.g. `#E6194B`).
    pub color: String,
    /// Last time this team was updated.
    pub updated_at: SystemTime,
}

/// RFID badge stored in persistence, keyed by the tag uid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BadgeEntity {
    /// Raw RFID tag uid, uppercase hexadecimal.
    pub rfid_uid: String,
    /// Optional player display name.
    pub player_name: Option<String>,
    /// Team the badge is assigned to, if any.
    pub team_id: Option<Uuid>,
    /// First time this badge was seen or registered.
    pub created_at: SystemTime,
}

/// Physical scan point stored in persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StationEntity {
    /// Stable identifier for the station.
    pub id: Uuid,
    /// Display name of the station.
    pub name: String,
    /// Free-form placement hint for the crew.
    pub location: Option<String>,
    /// Whether the station may take part in sessions.
    pub is_active: bool,
}

/// Game definition persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display name of the game.
    pub name: String,
    /// Mode and rule set played when this game is started.
    pub rules: GameRules,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
}

/// Lifecycle state of a persisted session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The session is running.
    Active,
    /// The session ended, with or without a winner.
    Completed,
}

/// One run of a game, mirrored to storage for history and audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Game definition the session was started from.
    pub game_id: Uuid,
    /// Game name frozen at session start.
    pub game_name: String,
    /// Rules frozen at session start.
    pub rules: GameRules,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Instant the session started.
    pub started_at: SystemTime,
    /// Instant the session ended, when completed.
    pub ended_at: Option<SystemTime>,
    /// Winning team, when one was declared.
    pub winner_team_id: Option<Uuid>,
    /// Stations that took part in the session.
    pub station_ids: Vec<Uuid>,
    /// Teams that took part in the session.
    pub team_ids: Vec<Uuid>,
    /// Control intervals accumulated by a king-of-the-hill session.
    pub control_intervals: Vec<ControlIntervalEntity>,
    /// Per-team progression of a sequence session.
    pub sequence_progress: Vec<SequenceProgressEntity>,
}

/// One span of uninterrupted control of a station by a team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlIntervalEntity {
    /// Station the interval belongs to.
    pub station_id: Uuid,
    /// Team that held the station.
    pub team_id: Uuid,
    /// Instant the team took control.
    pub controlled_at: SystemTime,
    /// Seconds of control credited for a closed interval.
    pub duration_secs: u64,
    /// Whether the interval was still open when exported.
    pub is_current: bool,
}

/// Per-team sequence progression mirrored to storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceProgressEntity {
    /// Team the record belongs to.
    pub team_id: Uuid,
    /// Next required sequence position.
    pub idx: usize,
    /// Stations completed so far.
    pub points: u32,
    /// Scans registered toward the current station's requirement.
    pub streak_count: u32,
    /// Armed deadline for the next required scan, when any.
    pub window_expires_at: Option<SystemTime>,
    /// Visited stations in free-form mode.
    pub visited: Vec<Uuid>,
    /// Instant of the last change.
    pub last_update: SystemTime,
}

/// One audited scan, whatever the outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRecordEntity {
    /// Session the scan was handled in.
    pub session_id: Uuid,
    /// Raw RFID tag uid presented at the station.
    pub rfid_uid: String,
    /// Station that read the tag.
    pub station_id: Uuid,
    /// Team resolved for the tag, when the badge was assigned.
    pub team_id: Option<Uuid>,
    /// Outcome label recorded for the feed.
    pub outcome: String,
    /// Instant the scan was handled.
    pub at: SystemTime,
}

/// One sequence scan kept in the replay audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceScanEntity {
    /// Reader-supplied identifier that deduplicates retransmissions.
    pub scan_id: String,
    /// Session the scan was evaluated in.
    pub session_id: Uuid,
    /// Team the scan was credited to.
    pub team_id: Uuid,
    /// Station that read the tag.
    pub station_id: Uuid,
    /// Outcome label recorded for the log.
    pub outcome: String,
    /// Instant the scan was evaluated.
    pub at: SystemTime,
}
