//! Session lifecycle: starting a session from a game definition, the
//! standings and progress projections, and the single completion path every
//! finisher (winning scan, ticker, explicit stop) funnels through.

use std::time::SystemTime;

use indexmap::{IndexMap, IndexSet};
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::SessionStatus,
    dto::{
        common::SessionSnapshot,
        game::{
            ControlStandingDto, ControlStandingsResponse, SequenceProgressResponse,
            SequenceTeamProgressDto, StartSessionRequest,
        },
        scan::ProgressDto,
    },
    error::ServiceError,
    services::{sse_events, storage_supervisor},
    state::{
        SharedState,
        game::{Game, GameRules, LiveSession, Team},
    },
};

/// Start a session from a game definition, freezing the roster and station
/// set for its whole lifetime.
///
/// Fails with a conflict while another session is active; the lifecycle
/// gate serializes this against stop and auto-completion.
pub async fn start_session(
    state: &SharedState,
    request: StartSessionRequest,
) -> Result<SessionSnapshot, ServiceError> {
    let _gate = state.session_gate().lock().await;

    {
        let guard = state.session().read().await;
        if let Some(active) = guard.as_ref() {
            return Err(ServiceError::InvalidState(format!(
                "session `{}` is already active",
                active.id
            )));
        }
    }

    let game: Game = state
        .games()
        .get(&request.game_id)
        .map(|entry| entry.clone())
        .ok_or_else(|| ServiceError::NotFound(format!("game `{}` not found", request.game_id)))?;

    let mut stations: IndexSet<Uuid> = IndexSet::with_capacity(request.station_ids.len());
    for station_id in &request.station_ids {
        let active = state
            .stations()
            .get(station_id)
            .map(|station| station.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("station `{station_id}` not found")))?;
        if !active {
            return Err(ServiceError::InvalidInput(format!(
                "station `{station_id}` is inactive"
            )));
        }
        stations.insert(*station_id);
    }

    if let GameRules::Sequence(rules) = &game.rules {
        for station_id in &rules.sequence {
            if !stations.contains(station_id) {
                return Err(ServiceError::InvalidInput(format!(
                    "sequence station `{station_id}` is not part of the session"
                )));
            }
        }
    }

    let mut teams: Vec<Team> = state.teams().iter().map(|team| team.clone()).collect();
    if teams.is_empty() {
        return Err(ServiceError::InvalidState(
            "cannot start a session with no teams registered".into(),
        ));
    }
    teams.sort_by(|a, b| a.name.cmp(&b.name));
    let teams: IndexMap<Uuid, Team> = teams.into_iter().map(|team| (team.id, team)).collect();

    let now = SystemTime::now();
    let session = LiveSession::new(game, stations, teams, now);
    let snapshot = SessionSnapshot::of(&session, now);
    let entity = session.to_entity(SessionStatus::Active, None);

    {
        let mut slot = state.session().write().await;
        *slot = Some(session);
    }

    info!(session_id = %snapshot.session_id, game = %snapshot.game_name, "session started");
    storage_supervisor::spawn_write(state, "save_session", move |store| {
        store.save_session(entity)
    });
    sse_events::broadcast_session_started(state, snapshot.clone());
    Ok(snapshot)
}

/// Explicitly end the active session. A winner recorded earlier (a finished
/// sequence racing the stop) is preserved in the final snapshot.
pub async fn stop_session(state: &SharedState) -> Result<SessionSnapshot, ServiceError> {
    let session_id = {
        let guard = state.session().read().await;
        guard.as_ref().map(|session| session.id)
    }
    .ok_or_else(|| ServiceError::NotFound("no active session".into()))?;

    complete_session(state, session_id, None)
        .await
        .ok_or_else(|| ServiceError::NotFound("no active session".into()))
}

/// End the session `expected_id`: close live control intervals, record the
/// winner when one is decided, persist the final mirror and broadcast the
/// outcome. Returns `None` when the slot holds no session or a different
/// one, which is how racing finishers resolve to a single completion.
pub async fn complete_session(
    state: &SharedState,
    expected_id: Uuid,
    winner_team_id: Option<Uuid>,
) -> Option<SessionSnapshot> {
    let _gate = state.session_gate().lock().await;
    let now = SystemTime::now();

    let session = {
        let mut slot = state.session().write().await;
        match slot.as_ref() {
            Some(session) if session.id == expected_id => slot.take(),
            _ => None,
        }
    }?;

    if let Some(board) = session.control_board() {
        board.close_all(now);
    }
    if let Some(team_id) = winner_team_id {
        session.try_record_winner(team_id);
    }

    let winner = session.winner();
    let entity = session.to_entity(SessionStatus::Completed, Some(now));
    storage_supervisor::spawn_write(state, "save_session", move |store| {
        store.save_session(entity)
    });

    info!(session_id = %session.id, winner_team_id = ?winner, "session completed");
    if let Some(team_id) = winner {
        let team_name = session
            .teams
            .get(&team_id)
            .map(|team| team.name.clone())
            .unwrap_or_default();
        sse_events::broadcast_victory(state, session.id, team_id, &team_name, now);
    }
    sse_events::broadcast_session_completed(state, session.id, winner, now);

    Some(SessionSnapshot::of(&session, now))
}

/// Snapshot of the active session.
pub async fn active_snapshot(state: &SharedState) -> Result<SessionSnapshot, ServiceError> {
    let guard = state.session().read().await;
    let session = guard
        .as_ref()
        .ok_or_else(|| ServiceError::NotFound("no active session".into()))?;
    Ok(SessionSnapshot::of(session, SystemTime::now()))
}

/// On-demand control standings of the active King-of-the-Hill session.
pub async fn control_standings(
    state: &SharedState,
) -> Result<ControlStandingsResponse, ServiceError> {
    let guard = state.session().read().await;
    let session = guard
        .as_ref()
        .ok_or_else(|| ServiceError::NotFound("no active session".into()))?;
    control_standings_of(session, SystemTime::now()).ok_or_else(|| {
        ServiceError::InvalidState("the active session is not king-of-the-hill".into())
    })
}

/// Standings table of a King-of-the-Hill session: one row per team, sorted
/// by control time descending with ties broken by ascending team id.
pub fn control_standings_of(
    session: &LiveSession,
    now: SystemTime,
) -> Option<ControlStandingsResponse> {
    let board = session.control_board()?;
    let rules = session.koth_rules()?;
    let target_secs = rules.control_time_to_win_sec.max(1);
    let totals = board.control_totals(now);

    let mut standings: Vec<ControlStandingDto> = session
        .teams
        .values()
        .map(|team| {
            let total = totals.get(&team.id).copied().unwrap_or_default();
            ControlStandingDto {
                team_id: team.id,
                name: team.name.clone(),
                color: team.color.clone(),
                seconds: total.seconds,
                percentage: ((total.seconds * 100) / target_secs).min(100) as u8,
                held_stations: total.held_stations,
            }
        })
        .collect();
    standings.sort_by(|a, b| b.seconds.cmp(&a.seconds).then(a.team_id.cmp(&b.team_id)));

    Some(ControlStandingsResponse {
        target_secs: rules.control_time_to_win_sec,
        elapsed_secs: session.elapsed_secs(now),
        standings,
    })
}

/// Per-team progression of the active sequence session, sorted by points
/// descending.
pub async fn sequence_progress(
    state: &SharedState,
) -> Result<SequenceProgressResponse, ServiceError> {
    let guard = state.session().read().await;
    let session = guard
        .as_ref()
        .ok_or_else(|| ServiceError::NotFound("no active session".into()))?;
    let board = session.sequence_board().ok_or_else(|| {
        ServiceError::InvalidState("the active session is not a sequence game".into())
    })?;

    let mut standings: Vec<SequenceTeamProgressDto> = board
        .all_progress()
        .iter()
        .map(|snapshot| SequenceTeamProgressDto {
            progress: ProgressDto::from(snapshot),
            name: session
                .teams
                .get(&snapshot.team_id)
                .map(|team| team.name.clone())
                .unwrap_or_default(),
            complete: board.snapshot_complete(snapshot),
        })
        .collect();
    // all_progress is ascending by team id; the stable sort keeps that
    // order for equal points.
    standings.sort_by(|a, b| b.progress.points.cmp(&a.progress.points));

    Ok(SequenceProgressResponse { standings })
}
