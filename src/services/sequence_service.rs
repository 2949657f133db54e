//! Sequence scan handling: idempotent evaluation through the board, win
//! detection and the follow-up broadcasts and persistence.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::SequenceScanEntity,
    dto::scan::{
        ProgressDto, ScanEventDto, ScanIgnoreReason, SequenceScanRequest, SequenceScanResponse,
    },
    services::{
        roster_service::{self, TagResolution},
        scan_service, session_service, sse_events, storage_supervisor,
    },
    state::{SharedState, game::WinRule, sequence::ScanOutcome},
};

/// Handle one sequence scan end to end.
///
/// A replayed `scan_id` returns the cached evaluation with no state change,
/// no broadcasts and no new audit rows. Dispositions that never reach the
/// board (no session, wrong mode, foreign station, unresolved badge) are
/// acknowledged as `Ignored` and deliberately kept out of the replay log,
/// so a redelivery once a session is running gets processed.
pub async fn handle_sequence_scan(
    state: &SharedState,
    request: SequenceScanRequest,
) -> SequenceScanResponse {
    let now = SystemTime::now();
    let SequenceScanRequest {
        scan_id,
        rfid_uid,
        station_id,
    } = request;

    let guard = state.session().read().await;
    let Some(session) = guard.as_ref() else {
        return acknowledge_ignored(
            state,
            None,
            scan_id,
            &rfid_uid,
            station_id,
            None,
            ScanIgnoreReason::NoActiveSession,
            now,
        )
        .await;
    };

    let session_id = session.id;
    let Some(board) = session.sequence_board() else {
        return acknowledge_ignored(
            state,
            Some(session_id),
            scan_id,
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
            scan_id,
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
                scan_id,
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
                scan_id,
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
                scan_id,
                &rfid_uid,
                station_id,
                None,
                ScanIgnoreReason::UnknownBadge,
                now,
            )
            .await;
        }
    };

    let first_to_finish = session
        .sequence_rules()
        .is_some_and(|rules| rules.win_rule == WinRule::FirstToFinish);
    let (evaluation, replayed) = board.process_scan(&scan_id, |board| {
        let mut evaluation = board.apply_scan(team_id, station_id, now);
        // Under first-to-finish the first scan completing the sequence
        // claims the win; a team finishing after the winner keeps its plain
        // outcome. Under most-points the ticker decides at timeout.
        if evaluation.complete && first_to_finish && session.try_record_winner(team_id) {
            evaluation.outcome = ScanOutcome::Win;
        }
        evaluation
    });

    let event = ScanEventDto::of_evaluation(&evaluation);
    let outcome_label = event.label();
    let response = SequenceScanResponse::new(scan_id.clone(), event);

    if replayed {
        debug!(scan_id, "replayed scan id; returning cached evaluation");
        return response;
    }

    sse_events::broadcast_sequence_progress(
        state,
        station_id,
        outcome_label,
        ProgressDto::from(&evaluation.progress),
    );
    scan_service::record_scan(
        state,
        Some(session_id),
        &rfid_uid,
        station_id,
        Some(team_id),
        outcome_label,
        now,
    )
    .await;

    let entity = SequenceScanEntity {
        scan_id,
        session_id,
        team_id,
        station_id,
        outcome: outcome_label.to_owned(),
        at: now,
    };
    storage_supervisor::spawn_write(state, "append_sequence_scan", move |store| {
        store.append_sequence_scan(entity)
    });

    if matches!(evaluation.outcome, ScanOutcome::Win) {
        info!(%team_id, session_id = %session_id, "sequence completed; finishing the session");
        drop(guard);
        session_service::complete_session(state, session_id, Some(team_id)).await;
    }

    response
}

#[allow(clippy::too_many_arguments)]
async fn acknowledge_ignored(
    state: &SharedState,
    session_id: Option<Uuid>,
    scan_id: String,
    rfid_uid: &str,
    station_id: Uuid,
    team_id: Option<Uuid>,
    reason: ScanIgnoreReason,
    now: SystemTime,
) -> SequenceScanResponse {
    debug!(scan_id, rfid_uid, %station_id, ?reason, "sequence scan ignored");
    let event = ScanEventDto::Ignored { reason };
    scan_service::record_scan(
        state,
        session_id,
        rfid_uid,
        station_id,
        team_id,
        event.label(),
        now,
    )
    .await;
    SequenceScanResponse::new(scan_id, event)
}
