//! King-of-the-Hill scan handling: badge resolution, control arbitration
//! and the shared scan feed plumbing both scan endpoints record through.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::ScanRecordEntity,
    dto::scan::{KothScanResponse, KothScanStatus, ScanIgnoreReason, ScanRequest},
    services::{
        roster_service::{self, TagResolution},
        session_service, sse_events, storage_supervisor,
    },
    state::{SharedState, control::CaptureOutcome, game::ScanRecord},
};

/// Handle one King-of-the-Hill scan end to end.
///
/// Every disposition is an acknowledgment: scans that cannot be processed
/// (no session, wrong mode, foreign station, unresolved badge) come back as
/// `ignored` with a reason instead of an error.
pub async fn handle_koth_scan(state: &SharedState, request: ScanRequest) -> KothScanResponse {
    let now = SystemTime::now();
    let ScanRequest {
        rfid_uid,
        station_id,
    } = request;

    let guard = state.session().read().await;
    let Some(session) = guard.as_ref() else {
        return acknowledge_ignored(
            state,
            None,
            &rfid_uid,
            station_id,
            None,
            ScanIgnoreReason::NoActiveSession,
            now,
        )
        .await;
    };

    let session_id = session.id;
    let Some(board) = session.control_board() else {
        return acknowledge_ignored(
            state,
            Some(session_id),
            &rfid_uid,
            station_id,
            None,
            ScanIgnoreReason::WrongGameMode,
            now,
        )
        .await;
    };
    if !session.has_station(station_id) {
        return acknowledge_ignored(
            state,
            Some(session_id),
            &rfid_uid,
            station_id,
            None,
            ScanIgnoreReason::StationNotInSession,
            now,
        )
        .await;
    }

    let team_id = match roster_service::resolve_team_for_tag(state, &rfid_uid) {
        TagResolution::Assigned(team_id) if session.teams.contains_key(&team_id) => team_id,
        TagResolution::Assigned(team_id) => {
            return acknowledge_ignored(
                state,
                Some(session_id),
                &rfid_uid,
                station_id,
                Some(team_id),
                ScanIgnoreReason::TeamNotInSession,
                now,
            )
            .await;
        }
        TagResolution::Unassigned => {
            return acknowledge_ignored(
                state,
                Some(session_id),
                &rfid_uid,
                station_id,
                None,
                ScanIgnoreReason::UnassignedBadge,
                now,
            )
            .await;
        }
        TagResolution::Unknown => {
            return acknowledge_ignored(
                state,
                Some(session_id),
                &rfid_uid,
                station_id,
                None,
                ScanIgnoreReason::UnknownBadge,
                now,
            )
            .await;
        }
    };

    match board.record_capture(station_id, team_id, now) {
        CaptureOutcome::Captured { previous } => {
            info!(%station_id, %team_id, previous = ?previous, "station changed hands");
            sse_events::broadcast_control_changed(state, station_id, team_id, previous, now);
            if let Some(standings) = session_service::control_standings_of(session, now) {
                sse_events::broadcast_standings(state, standings);
            }
            record_scan(
                state,
                Some(session_id),
                &rfid_uid,
                station_id,
                Some(team_id),
                KothScanStatus::Changed.label(),
                now,
            )
            .await;
            KothScanResponse::changed(station_id, team_id, previous, now)
        }
        CaptureOutcome::Unchanged => {
            record_scan(
                state,
                Some(session_id),
                &rfid_uid,
                station_id,
                Some(team_id),
                KothScanStatus::Unchanged.label(),
                now,
            )
            .await;
            KothScanResponse::unchanged(station_id, team_id, now)
        }
        // The membership check above passed, so the board disagreeing means
        // the station never belonged to this session's set.
        CaptureOutcome::UnknownStation => {
            acknowledge_ignored(
                state,
                Some(session_id),
                &rfid_uid,
                station_id,
                Some(team_id),
                ScanIgnoreReason::StationNotInSession,
                now,
            )
            .await
        }
    }
}

/// Append one scan to the in-memory feed, broadcast it, and mirror it to the
/// store when a session is attributable.
pub(crate) async fn record_scan(
    state: &SharedState,
    session_id: Option<Uuid>,
    rfid_uid: &str,
    station_id: Uuid,
    team_id: Option<Uuid>,
    outcome: &str,
    at: SystemTime,
) {
    let record = ScanRecord {
        rfid_uid: rfid_uid.to_owned(),
        station_id,
        team_id,
        outcome: outcome.to_owned(),
        at,
    };
    state.push_scan_record(record.clone()).await;
    sse_events::broadcast_scan_recorded(state, &record);

    if let Some(session_id) = session_id {
        let entity = ScanRecordEntity {
            session_id,
            rfid_uid: record.rfid_uid,
            station_id,
            team_id,
            outcome: record.outcome,
            at,
        };
        storage_supervisor::spawn_write(state, "append_scan", move |store| {
            store.append_scan(entity)
        });
    }
}

async fn acknowledge_ignored(
    state: &SharedState,
    session_id: Option<Uuid>,
    rfid_uid: &str,
    station_id: Uuid,
    team_id: Option<Uuid>,
    reason: ScanIgnoreReason,
    now: SystemTime,
) -> KothScanResponse {
    debug!(rfid_uid, %station_id, ?reason, "scan ignored");
    record_scan(
        state,
        session_id,
        rfid_uid,
        station_id,
        team_id,
        KothScanStatus::Ignored.label(),
        now,
    )
    .await;
    KothScanResponse::ignored(station_id, reason, now)
}
