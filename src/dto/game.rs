//! Payloads for game definitions and session lifecycle endpoints.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    config::SequenceDefaults,
    dto::{format_system_time, scan::ProgressDto},
    state::game::{
        DefenderLock, Game, GameRules, KothRules, SequenceMode, SequenceRules, WinRule,
        WrongScanPenalty,
    },
};

/// Payload used to register a new game definition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGameRequest {
    pub name: String,
    pub rules: GameRulesInput,
}

/// Incoming rule set, one variant per supported mode.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameRulesInput {
    KingOfTheHill(KothRulesInput),
    Sequence(SequenceRulesInput),
}

/// Incoming King-of-the-Hill parameters.
#[derive(Debug, Deserialize, ToSchema)]
pub struct KothRulesInput {
    /// Cumulative control seconds a team needs to win.
    pub control_time_to_win_sec: u64,
}

/// Incoming sequence parameters. Omitted knobs fall back to the configured
/// defaults.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SequenceRulesInput {
    pub mode: SequenceMode,
    /// Station ids to visit: the required order in ORDERED mode, the target
    /// set in FREE mode.
    pub sequence: Vec<Uuid>,
    /// Scans required per station (stations absent from the map need one).
    #[serde(default, with = "crate::state::game::multi_scan_map")]
    #[schema(value_type = HashMap<String, u32>)]
    pub multi_scan: IndexMap<Uuid, u32>,
    /// If not specified, the configured default applies. If null or zero is
    /// specified, the time windows are disabled.
    #[serde(default)]
    #[schema(value_type = Option<u32>)]
    pub time_window_sec: Option<Option<u32>>,
    #[serde(default)]
    pub wrong_scan_penalty: Option<WrongScanPenalty>,
    #[serde(default)]
    pub defender_lock: Option<DefenderLock>,
    #[serde(default)]
    pub win_rule: Option<WinRule>,
    #[serde(default)]
    pub max_duration_sec: Option<u64>,
}

impl GameRulesInput {
    /// Resolve the payload into a full rule set using `defaults` for every
    /// omitted sequence knob.
    pub fn into_rules(self, defaults: &SequenceDefaults) -> GameRules {
        match self {
            GameRulesInput::KingOfTheHill(input) => GameRules::KingOfTheHill(KothRules {
                control_time_to_win_sec: input.control_time_to_win_sec,
            }),
            GameRulesInput::Sequence(input) => GameRules::Sequence(input.into_rules(defaults)),
        }
    }
}

impl SequenceRulesInput {
    fn into_rules(self, defaults: &SequenceDefaults) -> SequenceRules {
        let time_window_sec = match self.time_window_sec {
            None => defaults.time_window_sec,
            Some(None) | Some(Some(0)) => None,
            Some(Some(seconds)) => Some(seconds),
        };

        SequenceRules {
            mode: self.mode,
            sequence: self.sequence,
            multi_scan: self.multi_scan,
            time_window_sec,
            wrong_scan_penalty: self
                .wrong_scan_penalty
                .unwrap_or(defaults.wrong_scan_penalty),
            defender_lock: self.defender_lock.unwrap_or(defaults.defender_lock),
            win_rule: self.win_rule.unwrap_or(defaults.win_rule),
            max_duration_sec: self.max_duration_sec.unwrap_or(defaults.max_duration_sec),
        }
    }
}

impl Validate for CreateGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", simple_error("non_empty", "game name must not be empty"));
        }

        match &self.rules {
            GameRulesInput::KingOfTheHill(input) => {
                if input.control_time_to_win_sec == 0 {
                    errors.add(
                        "rules",
                        simple_error("control_time", "control time to win must be at least 1s"),
                    );
                }
            }
            GameRulesInput::Sequence(input) => {
                if input.sequence.is_empty() {
                    errors.add(
                        "rules",
                        simple_error("sequence_empty", "sequence must name at least one station"),
                    );
                }

                // A duplicated station in FREE mode would make the full set
                // impossible to visit.
                if input.mode == SequenceMode::Free {
                    let unique: HashSet<Uuid> = input.sequence.iter().copied().collect();
                    if unique.len() != input.sequence.len() {
                        errors.add(
                            "rules",
                            simple_error(
                                "sequence_duplicates",
                                "FREE mode requires unique station ids",
                            ),
                        );
                    }
                }

                if input.multi_scan.values().any(|&count| count == 0) {
                    errors.add(
                        "rules",
                        simple_error("multi_scan_zero", "multi-scan counts must be at least 1"),
                    );
                }

                if input.max_duration_sec == Some(0) {
                    errors.add(
                        "rules",
                        simple_error("max_duration_zero", "max duration must be at least 1s"),
                    );
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Summary returned once a game has been created or listed.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameSummary {
    pub id: Uuid,
    pub name: String,
    pub rules: GameRules,
    pub created_at: String,
}

impl From<&Game> for GameSummary {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id,
            name: game.name.clone(),
            rules: game.rules.clone(),
            created_at: format_system_time(game.created_at),
        }
    }
}

/// Payload used to start a session from a game definition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub game_id: Uuid,
    /// Stations taking part in the session.
    pub station_ids: Vec<Uuid>,
}

impl Validate for StartSessionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.station_ids.is_empty() {
            errors.add(
                "station_ids",
                simple_error("stations_empty", "a session needs at least one station"),
            );
        }

        let unique: HashSet<Uuid> = self.station_ids.iter().copied().collect();
        if unique.len() != self.station_ids.len() {
            errors.add(
                "station_ids",
                simple_error("stations_duplicates", "station ids must be unique"),
            );
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Control-time standings of a King-of-the-Hill session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ControlStandingsResponse {
    /// Cumulative control seconds required to win.
    pub target_secs: u64,
    /// Whole seconds since the session started.
    pub elapsed_secs: u64,
    /// One row per team, sorted by descending control time.
    pub standings: Vec<ControlStandingDto>,
}

/// One team's row in the control-time standings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ControlStandingDto {
    pub team_id: Uuid,
    pub name: String,
    pub color: String,
    /// Cumulative control seconds across all stations.
    pub seconds: u64,
    /// Progress toward the target, capped at 100.
    pub percentage: u8,
    /// Stations currently held by the team.
    pub held_stations: u32,
}

/// Per-team progression of a sequence session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SequenceProgressResponse {
    /// One row per team that has scanned, sorted by descending points.
    pub standings: Vec<SequenceTeamProgressDto>,
}

/// One team's row in the sequence progress table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SequenceTeamProgressDto {
    #[serde(flatten)]
    pub progress: ProgressDto,
    pub name: String,
    /// Whether the team has finished the whole sequence.
    pub complete: bool,
}

fn simple_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> SequenceDefaults {
        SequenceDefaults::default()
    }

    fn sequence_input(mode: SequenceMode, sequence: Vec<Uuid>) -> SequenceRulesInput {
        SequenceRulesInput {
            mode,
            sequence,
            multi_scan: IndexMap::new(),
            time_window_sec: None,
            wrong_scan_penalty: None,
            defender_lock: None,
            win_rule: None,
            max_duration_sec: None,
        }
    }

    #[test]
    fn omitted_sequence_knobs_take_defaults() {
        let input = sequence_input(SequenceMode::Ordered, vec![Uuid::from_u128(1)]);
        let rules = GameRulesInput::Sequence(input).into_rules(&defaults());

        let GameRules::Sequence(rules) = rules else {
            panic!("expected sequence rules");
        };
        assert_eq!(rules.time_window_sec, Some(60));
        assert_eq!(rules.wrong_scan_penalty, WrongScanPenalty::ResetToZero);
        assert_eq!(rules.defender_lock.cooldown_sec, 15);
        assert_eq!(rules.win_rule, WinRule::FirstToFinish);
        assert_eq!(rules.max_duration_sec, 600);
    }

    #[test]
    fn explicit_null_window_disables_deadlines() {
        let mut input = sequence_input(SequenceMode::Ordered, vec![Uuid::from_u128(1)]);
        input.time_window_sec = Some(None);
        let GameRules::Sequence(rules) = GameRulesInput::Sequence(input).into_rules(&defaults())
        else {
            panic!("expected sequence rules");
        };
        assert_eq!(rules.time_window_sec, None);

        let mut input = sequence_input(SequenceMode::Ordered, vec![Uuid::from_u128(1)]);
        input.time_window_sec = Some(Some(0));
        let GameRules::Sequence(rules) = GameRulesInput::Sequence(input).into_rules(&defaults())
        else {
            panic!("expected sequence rules");
        };
        assert_eq!(rules.time_window_sec, None);
    }

    #[test]
    fn free_mode_rejects_duplicate_stations() {
        let station = Uuid::from_u128(7);
        let request = CreateGameRequest {
            name: "dup".into(),
            rules: GameRulesInput::Sequence(sequence_input(
                SequenceMode::Free,
                vec![station, station],
            )),
        };
        assert!(request.validate().is_err());

        let request = CreateGameRequest {
            name: "dup".into(),
            rules: GameRulesInput::Sequence(sequence_input(
                SequenceMode::Ordered,
                vec![station, station],
            )),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let request = CreateGameRequest {
            name: "empty".into(),
            rules: GameRulesInput::Sequence(sequence_input(SequenceMode::Ordered, Vec::new())),
        };
        assert!(request.validate().is_err());
    }
}
