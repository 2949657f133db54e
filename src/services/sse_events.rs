use std::time::SystemTime;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        common::SessionSnapshot,
        format_system_time,
        game::ControlStandingsResponse,
        scan::{ProgressDto, ScanRecordDto},
        sse::{
            ControlChangedEvent, ScanRecordedEvent, SequenceProgressEvent, ServerEvent,
            SessionCompletedEvent, SessionStartedEvent, StandingsEvent, SystemStatus,
            VictoryEvent,
        },
    },
    state::{SharedState, game::ScanRecord},
};

const EVENT_CONTROL_CHANGED: &str = "control-changed";
const EVENT_STANDINGS: &str = "standings";
const EVENT_SEQUENCE_PROGRESS: &str = "sequence-progress";
const EVENT_SESSION_STARTED: &str = "session-started";
const EVENT_SESSION_COMPLETED: &str = "session-completed";
const EVENT_VICTORY: &str = "victory";
const EVENT_SCAN_RECORDED: &str = "scan-recorded";
const EVENT_SYSTEM_STATUS: &str = "system-status";

/// Broadcast a station changing hands during a King-of-the-Hill session.
pub fn broadcast_control_changed(
    state: &SharedState,
    station_id: Uuid,
    team_id: Uuid,
    previous_team_id: Option<Uuid>,
    at: SystemTime,
) {
    let payload = ControlChangedEvent {
        station_id,
        team_id,
        previous_team_id,
        at: format_system_time(at),
    };
    send_public_event(state, EVENT_CONTROL_CHANGED, &payload);
}

/// Broadcast the refreshed control-time standings.
pub fn broadcast_standings(state: &SharedState, standings: ControlStandingsResponse) {
    let payload = StandingsEvent(standings);
    send_public_event(state, EVENT_STANDINGS, &payload);
}

/// Broadcast a team's updated sequence progression after a scan.
pub fn broadcast_sequence_progress(
    state: &SharedState,
    station_id: Uuid,
    outcome: &str,
    progress: ProgressDto,
) {
    let payload = SequenceProgressEvent {
        team_id: progress.team_id,
        station_id,
        outcome: outcome.to_owned(),
        progress,
    };
    send_public_event(state, EVENT_SEQUENCE_PROGRESS, &payload);
}

/// Broadcast the snapshot of a freshly started session.
pub fn broadcast_session_started(state: &SharedState, snapshot: SessionSnapshot) {
    let payload = SessionStartedEvent(snapshot);
    send_public_event(state, EVENT_SESSION_STARTED, &payload);
}

/// Broadcast the end of a session, with or without a winner.
pub fn broadcast_session_completed(
    state: &SharedState,
    session_id: Uuid,
    winner_team_id: Option<Uuid>,
    ended_at: SystemTime,
) {
    let payload = SessionCompletedEvent {
        session_id,
        winner_team_id,
        ended_at: format_system_time(ended_at),
    };
    send_public_event(state, EVENT_SESSION_COMPLETED, &payload);
}

/// Broadcast the once-only victory notification.
pub fn broadcast_victory(
    state: &SharedState,
    session_id: Uuid,
    team_id: Uuid,
    team_name: &str,
    at: SystemTime,
) {
    let payload = VictoryEvent {
        session_id,
        team_id,
        team_name: team_name.to_owned(),
        at: format_system_time(at),
    };
    send_public_event(state, EVENT_VICTORY, &payload);
}

/// Broadcast a scan appended to the recent-scans feed.
pub fn broadcast_scan_recorded(state: &SharedState, record: &ScanRecord) {
    let payload = ScanRecordedEvent(ScanRecordDto::from(record));
    send_public_event(state, EVENT_SCAN_RECORDED, &payload);
}

/// Broadcast a degraded-mode transition.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
