//! Runtime domain types shared by the engines: roster entries, game
//! definitions and the live session aggregate.

use std::sync::OnceLock;
use std::time::SystemTime;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{
    BadgeEntity, GameEntity, SessionEntity, SessionStatus, StationEntity, TeamEntity,
};
use crate::state::control::ControlBoard;
use crate::state::sequence::SequenceBoard;

/// Team registered in the roster.
#[derive(Debug, Clone)]
pub struct Team {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name of the team.
    pub name: String,
    /// Display color assigned to the team (hex string).
    pub color: String,
    /// Last time this team was updated.
    pub updated_at: SystemTime,
}

/// Badge (physical RFID tag) registered in the roster.
#[derive(Debug, Clone)]
pub struct Badge {
    /// Tag identifier scanners send with every scan (unique).
    pub rfid_uid: String,
    /// Optional name of the player carrying the badge.
    pub player_name: Option<String>,
    /// Team this badge is assigned to, when any.
    pub team_id: Option<Uuid>,
    /// First time the badge was registered or seen.
    pub created_at: SystemTime,
}

/// Physical RFID checkpoint that scanners report from.
#[derive(Debug, Clone)]
pub struct Station {
    /// Stable hardware identifier carried in scan events.
    pub id: Uuid,
    /// Display name of the checkpoint.
    pub name: String,
    /// Optional free-form location hint for operators.
    pub location: Option<String>,
    /// Inactive stations cannot join new sessions.
    pub is_active: bool,
}

/// Reusable game definition selected when starting a session.
#[derive(Debug, Clone)]
pub struct Game {
    /// Primary key of the game definition.
    pub id: Uuid,
    /// Display name of the game.
    pub name: String,
    /// Rule set deciding which engine the session runs.
    pub rules: GameRules,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
}

/// Rule set for a game, one variant per supported mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameRules {
    /// Cumulative control-time race across the session's stations.
    KingOfTheHill(KothRules),
    /// Station visitation race, ordered or free-form.
    Sequence(SequenceRules),
}

/// Parameters of a King-of-the-Hill game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KothRules {
    /// Cumulative control time a team needs to win, in seconds.
    pub control_time_to_win_sec: u64,
}

/// Ordering flavour of a sequence game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequenceMode {
    /// Stations must be completed in the configured order.
    Ordered,
    /// Stations may be visited in any order.
    Free,
}

/// Penalty applied when a team scans outside the expected order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WrongScanPenalty {
    /// Progress falls back to the start of the sequence.
    ResetToZero,
    /// The armed deadline is pulled earlier by the given amount.
    TimePenalty {
        /// Seconds subtracted from the armed deadline.
        seconds: u32,
    },
    /// Signal only, progress is left untouched.
    None,
}

/// Which station a completed multi-scan requirement locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DefenderLockMode {
    /// Lock the station the team just completed.
    LockCurrent,
    /// Lock the station completed before the current one.
    LockLast,
}

/// Cooldown guarding completed stations against other teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DefenderLock {
    /// Which completed station the cooldown applies to.
    pub mode: DefenderLockMode,
    /// Cooldown length in seconds.
    pub cooldown_sec: u32,
}

/// How a sequence session decides its winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WinRule {
    /// First team completing the sequence wins immediately.
    FirstToFinish,
    /// When the session times out, the team with the most points wins.
    MostPointsWhenTimeEnds,
}

/// Full parameter set of a sequence game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SequenceRules {
    /// Ordering flavour of the sequence.
    pub mode: SequenceMode,
    /// Station ids to visit: the required order in ORDERED mode, the full
    /// target set in FREE mode.
    pub sequence: Vec<Uuid>,
    /// Scans required per station before it counts as completed (default 1).
    #[serde(default, with = "multi_scan_map")]
    #[schema(value_type = HashMap<String, u32>)]
    pub multi_scan: IndexMap<Uuid, u32>,
    /// Deadline in seconds to reach the next station after an advance.
    pub time_window_sec: Option<u32>,
    /// Penalty applied on an out-of-order scan.
    pub wrong_scan_penalty: WrongScanPenalty,
    /// Cooldown configuration for completed stations.
    pub defender_lock: DefenderLock,
    /// Win rule for the session.
    pub win_rule: WinRule,
    /// Wall-clock bound for the whole session, in seconds.
    pub max_duration_sec: u64,
}

/// Ship the multi-scan map with string keys so it survives formats that
/// only take string map keys (JSON objects, BSON documents).
pub(crate) mod multi_scan_map {
    use indexmap::IndexMap;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use uuid::Uuid;

    pub fn serialize<S>(map: &IndexMap<Uuid, u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(id, count)| (id.to_string(), *count)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<IndexMap<Uuid, u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IndexMap::<String, u32>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(id, count)| {
                Uuid::parse_str(&id)
                    .map(|id| (id, count))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

impl SequenceRules {
    /// Scans required to complete `station_id`, never below one.
    pub fn required_scans(&self, station_id: Uuid) -> u32 {
        self.multi_scan
            .get(&station_id)
            .copied()
            .unwrap_or(1)
            .max(1)
    }

    /// Whether `station_id` belongs to the configured sequence.
    pub fn contains(&self, station_id: Uuid) -> bool {
        self.sequence.contains(&station_id)
    }
}

/// Entry of the bounded recent-scans feed.
#[derive(Debug, Clone)]
pub struct ScanRecord {
    /// Tag identifier as reported by the scanner.
    pub rfid_uid: String,
    /// Station the scan happened at.
    pub station_id: Uuid,
    /// Team the badge resolved to, when any.
    pub team_id: Option<Uuid>,
    /// Outcome label the engine computed for the scan.
    pub outcome: String,
    /// Time the scan was processed.
    pub at: SystemTime,
}

/// Engine state backing a live session, one variant per game mode.
#[derive(Debug)]
pub enum GameBoard {
    /// King-of-the-Hill control arbitration state.
    Control(ControlBoard),
    /// Sequence progression state.
    Sequence(SequenceBoard),
}

/// Aggregated state for the in-progress game session.
#[derive(Debug)]
pub struct LiveSession {
    /// Primary key of the session.
    pub id: Uuid,
    /// Game definition this session runs.
    pub game: Game,
    /// Stations participating in the session, in configured order.
    pub stations: IndexSet<Uuid>,
    /// Roster snapshot taken when the session started.
    pub teams: IndexMap<Uuid, Team>,
    /// Session start timestamp.
    pub started_at: SystemTime,
    /// Engine state for the session's game mode.
    pub board: GameBoard,
    winner: OnceLock<Uuid>,
}

impl LiveSession {
    /// Build a fresh session for `game`, seeding the matching engine board.
    pub fn new(
        game: Game,
        stations: IndexSet<Uuid>,
        teams: IndexMap<Uuid, Team>,
        started_at: SystemTime,
    ) -> Self {
        let board = match &game.rules {
            GameRules::KingOfTheHill(_) => {
                GameBoard::Control(ControlBoard::new(stations.iter().copied()))
            }
            GameRules::Sequence(rules) => GameBoard::Sequence(SequenceBoard::new(rules.clone())),
        };

        Self {
            id: Uuid::new_v4(),
            game,
            stations,
            teams,
            started_at,
            board,
            winner: OnceLock::new(),
        }
    }

    /// Record the winning team. Succeeds only for the first caller, so the
    /// victory decision stays race-free when a scan and the evaluation tick
    /// cross the line together.
    pub fn try_record_winner(&self, team_id: Uuid) -> bool {
        self.winner.set(team_id).is_ok()
    }

    /// Winning team once one has been recorded.
    pub fn winner(&self) -> Option<Uuid> {
        self.winner.get().copied()
    }

    /// Team ids sorted ascending, the documented tie-break evaluation order.
    pub fn team_ids_in_evaluation_order(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.teams.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether `station_id` belongs to this session's station set.
    pub fn has_station(&self, station_id: Uuid) -> bool {
        self.stations.contains(&station_id)
    }

    /// Control board of a King-of-the-Hill session.
    pub fn control_board(&self) -> Option<&ControlBoard> {
        match &self.board {
            GameBoard::Control(board) => Some(board),
            GameBoard::Sequence(_) => None,
        }
    }

    /// Sequence board of a sequence session.
    pub fn sequence_board(&self) -> Option<&SequenceBoard> {
        match &self.board {
            GameBoard::Sequence(board) => Some(board),
            GameBoard::Control(_) => None,
        }
    }

    /// King-of-the-Hill rules when the session runs that mode.
    pub fn koth_rules(&self) -> Option<&KothRules> {
        match &self.game.rules {
            GameRules::KingOfTheHill(rules) => Some(rules),
            GameRules::Sequence(_) => None,
        }
    }

    /// Sequence rules when the session runs that mode.
    pub fn sequence_rules(&self) -> Option<&SequenceRules> {
        match &self.game.rules {
            GameRules::Sequence(rules) => Some(rules),
            GameRules::KingOfTheHill(_) => None,
        }
    }

    /// Whole seconds elapsed since the session started, clamped at zero.
    pub fn elapsed_secs(&self, now: SystemTime) -> u64 {
        now.duration_since(self.started_at)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }

    /// Build the persistence mirror of this session.
    pub fn to_entity(&self, status: SessionStatus, ended_at: Option<SystemTime>) -> SessionEntity {
        let control_intervals = match &self.board {
            GameBoard::Control(board) => board.export_intervals(),
            GameBoard::Sequence(_) => Vec::new(),
        };
        let sequence_progress = match &self.board {
            GameBoard::Sequence(board) => board.export_progress(),
            GameBoard::Control(_) => Vec::new(),
        };

        SessionEntity {
            id: self.id,
            game_id: self.game.id,
            game_name: self.game.name.clone(),
            rules: self.game.rules.clone(),
            status,
            started_at: self.started_at,
            ended_at,
            winner_team_id: self.winner(),
            station_ids: self.stations.iter().copied().collect(),
            team_ids: self.teams.keys().copied().collect(),
            control_intervals,
            sequence_progress,
        }
    }
}

impl From<TeamEntity> for Team {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            updated_at: value.updated_at,
        }
    }
}

impl From<Team> for TeamEntity {
    fn from(value: Team) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            updated_at: value.updated_at,
        }
    }
}

impl From<BadgeEntity> for Badge {
    fn from(value: BadgeEntity) -> Self {
        Self {
            rfid_uid: value.rfid_uid,
            player_name: value.player_name,
            team_id: value.team_id,
            created_at: value.created_at,
        }
    }
}

impl From<Badge> for BadgeEntity {
    fn from(value: Badge) -> Self {
        Self {
            rfid_uid: value.rfid_uid,
            player_name: value.player_name,
            team_id: value.team_id,
            created_at: value.created_at,
        }
    }
}

impl From<StationEntity> for Station {
    fn from(value: StationEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            location: value.location,
            is_active: value.is_active,
        }
    }
}

impl From<Station> for StationEntity {
    fn from(value: Station) -> Self {
        Self {
            id: value.id,
            name: value.name,
            location: value.location,
            is_active: value.is_active,
        }
    }
}

impl From<GameEntity> for Game {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            rules: value.rules,
            created_at: value.created_at,
        }
    }
}

impl From<Game> for GameEntity {
    fn from(value: Game) -> Self {
        Self {
            id: value.id,
            name: value.name,
            rules: value.rules,
            created_at: value.created_at,
        }
    }
}
