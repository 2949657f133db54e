//! Periodic session evaluation: live standings broadcasts, the control-time
//! win threshold and the sequence wall-clock bound.

use std::time::SystemTime;

use tokio::time::interval;
use uuid::Uuid;

use crate::{
    services::{session_service, sse_events},
    state::{
        SharedState, control,
        game::{GameBoard, LiveSession, WinRule},
    },
};

/// Drive the evaluation loop at the configured standings cadence. Spawned
/// once at startup and never returns.
pub async fn run(state: SharedState) {
    let mut tick = interval(state.config().standings_tick());
    loop {
        tick.tick().await;
        evaluate(&state, SystemTime::now()).await;
    }
}

/// One evaluation pass. The completion decision is computed under the read
/// guard and acted on after it is released, since finishing a session takes
/// the write lock.
async fn evaluate(state: &SharedState, now: SystemTime) {
    let decision: Option<(Uuid, Option<Uuid>)> = {
        let guard = state.session().read().await;
        let Some(session) = guard.as_ref() else {
            return;
        };
        match &session.board {
            GameBoard::Control(board) => {
                let Some(rules) = session.koth_rules() else {
                    return;
                };
                if let Some(standings) = session_service::control_standings_of(session, now) {
                    sse_events::broadcast_standings(state, standings);
                }
                let totals = board.control_totals(now);
                let order = session.team_ids_in_evaluation_order();
                match control::first_to_threshold(&totals, &order, rules.control_time_to_win_sec) {
                    Some(team_id) if session.try_record_winner(team_id) => {
                        Some((session.id, Some(team_id)))
                    }
                    _ => None,
                }
            }
            GameBoard::Sequence(_) => {
                let Some(rules) = session.sequence_rules() else {
                    return;
                };
                if session.elapsed_secs(now) < rules.max_duration_sec {
                    return;
                }
                let winner = match rules.win_rule {
                    WinRule::FirstToFinish => None,
                    WinRule::MostPointsWhenTimeEnds => most_points_winner(session),
                };
                match winner {
                    Some(team_id) if session.try_record_winner(team_id) => {
                        Some((session.id, Some(team_id)))
                    }
                    // A winner was already recorded; that path finishes the
                    // session itself.
                    Some(_) => None,
                    // Timing out with no decidable winner still ends the
                    // session.
                    None => Some((session.id, None)),
                }
            }
        }
    };

    if let Some((session_id, winner)) = decision {
        session_service::complete_session(state, session_id, winner).await;
    }
}

/// Team with the most points, ties broken by ascending team id. Teams with
/// zero points never win by timeout.
fn most_points_winner(session: &LiveSession) -> Option<Uuid> {
    let Some(board) = session.sequence_board() else {
        return None;
    };
    let mut best: Option<(u32, Uuid)> = None;
    // all_progress is ascending by team id, so the strict comparison keeps
    // the lowest id on a tie.
    for snapshot in board.all_progress() {
        if snapshot.points == 0 {
            continue;
        }
        if best.is_none_or(|(points, _)| snapshot.points > points) {
            best = Some((snapshot.points, snapshot.team_id));
        }
    }
    best.map(|(_, team_id)| team_id)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use indexmap::{IndexMap, IndexSet};

    use super::*;
    use crate::state::game::{
        DefenderLock, DefenderLockMode, Game, GameRules, SequenceMode, SequenceRules, Team,
        WrongScanPenalty,
    };

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn team(n: u128, name: &str) -> Team {
        Team {
            id: Uuid::from_u128(n),
            name: name.to_owned(),
            color: "#ff0000".to_owned(),
            updated_at: t(0),
        }
    }

    fn sequence_session(stations: &[Uuid], teams: &[Team]) -> LiveSession {
        let rules = SequenceRules {
            mode: SequenceMode::Free,
            sequence: stations.to_vec(),
            multi_scan: IndexMap::new(),
            time_window_sec: None,
            wrong_scan_penalty: WrongScanPenalty::None,
            defender_lock: DefenderLock {
                mode: DefenderLockMode::LockCurrent,
                cooldown_sec: 0,
            },
            win_rule: WinRule::MostPointsWhenTimeEnds,
            max_duration_sec: 600,
        };
        let game = Game {
            id: Uuid::from_u128(99),
            name: "relay".to_owned(),
            rules: GameRules::Sequence(rules),
            created_at: t(0),
        };
        let station_set: IndexSet<Uuid> = stations.iter().copied().collect();
        let roster: IndexMap<Uuid, Team> =
            teams.iter().map(|team| (team.id, team.clone())).collect();
        LiveSession::new(game, station_set, roster, t(0))
    }

    #[test]
    fn most_points_prefers_lowest_team_id_on_tie() {
        let stations = [Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)];
        let red = team(5, "red");
        let blue = team(2, "blue");
        let session = sequence_session(&stations, &[red.clone(), blue.clone()]);
        let board = session.sequence_board().unwrap();

        board.apply_scan(red.id, stations[0], t(10));
        board.apply_scan(blue.id, stations[1], t(11));

        assert_eq!(most_points_winner(&session), Some(blue.id));
    }

    #[test]
    fn most_points_ignores_teams_without_progress() {
        let stations = [Uuid::from_u128(1), Uuid::from_u128(2)];
        let red = team(5, "red");
        let session = sequence_session(&stations, &[red]);

        assert_eq!(most_points_winner(&session), None);
    }

    #[test]
    fn most_points_picks_the_leader() {
        let stations = [Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)];
        let red = team(5, "red");
        let blue = team(2, "blue");
        let session = sequence_session(&stations, &[red.clone(), blue.clone()]);
        let board = session.sequence_board().unwrap();

        board.apply_scan(red.id, stations[0], t(10));
        board.apply_scan(red.id, stations[1], t(12));
        board.apply_scan(blue.id, stations[2], t(11));

        assert_eq!(most_points_winner(&session), Some(red.id));
    }
}
