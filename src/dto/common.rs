use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use std::time::SystemTime;

use crate::{
    dto::{format_system_time, roster::TeamSummary},
    state::game::{GameRules, LiveSession},
};

/// Shared snapshot describing the running session and its participants.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub game_id: Uuid,
    pub game_name: String,
    /// Rules frozen when the session started.
    pub rules: GameRules,
    pub started_at: String,
    /// Whole seconds since the session started.
    pub elapsed_secs: u64,
    /// Stations taking part, in configured order.
    pub station_ids: Vec<Uuid>,
    /// Roster snapshot taken at session start.
    pub teams: Vec<TeamSummary>,
    /// Winning team once the session has been decided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_team_id: Option<Uuid>,
}

impl SessionSnapshot {
    /// Project the live session into its public snapshot.
    pub fn of(session: &LiveSession, now: SystemTime) -> Self {
        Self {
            session_id: session.id,
            game_id: session.game.id,
            game_name: session.game.name.clone(),
            rules: session.game.rules.clone(),
            started_at: format_system_time(session.started_at),
            elapsed_secs: session.elapsed_secs(now),
            station_ids: session.stations.iter().copied().collect(),
            teams: session.teams.values().map(TeamSummary::from).collect(),
            winner_team_id: session.winner(),
        }
    }
}
