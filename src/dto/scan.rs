//! Payloads for the scan endpoints: requests, evaluated outcomes and the
//! LED feedback grid scanner firmware renders.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        format_system_time,
        validation::{validate_rfid_uid, validate_scan_id},
    },
    state::game::ScanRecord,
    state::sequence::{ProgressSnapshot, ScanEvaluation, ScanOutcome},
};

/// Scan reported by a station during a King-of-the-Hill session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// RFID tag uid read by the station.
    pub rfid_uid: String,
    /// Station that read the tag.
    pub station_id: Uuid,
}

impl Validate for ScanRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_rfid_uid(&self.rfid_uid) {
            errors.add("rfid_uid", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Scan reported by a station during a sequence session. The reader-supplied
/// `scan_id` deduplicates retransmissions.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SequenceScanRequest {
    /// Unique id the reader attaches to the scan, stable across retries.
    pub scan_id: String,
    /// RFID tag uid read by the station.
    pub rfid_uid: String,
    /// Station that read the tag.
    pub station_id: Uuid,
}

impl Validate for SequenceScanRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_scan_id(&self.scan_id) {
            errors.add("scan_id", e);
        }
        if let Err(e) = validate_rfid_uid(&self.rfid_uid) {
            errors.add("rfid_uid", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Why a scan was acknowledged without reaching the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanIgnoreReason {
    /// No session is currently running.
    NoActiveSession,
    /// The running session plays the other game mode.
    WrongGameMode,
    /// The station does not take part in the running session.
    StationNotInSession,
    /// The tag uid is not registered as a badge.
    UnknownBadge,
    /// The badge has no team assignment.
    UnassignedBadge,
    /// The badge's team is not part of the session's roster snapshot.
    TeamNotInSession,
}

/// Outcome of a King-of-the-Hill scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KothScanStatus {
    /// The team took control of the station.
    Changed,
    /// The team already held the station.
    Unchanged,
    /// The scan was acknowledged but not processed.
    Ignored,
}

impl KothScanStatus {
    /// Label recorded in the scan feed.
    pub fn label(self) -> &'static str {
        match self {
            KothScanStatus::Changed => "CHANGED",
            KothScanStatus::Unchanged => "UNCHANGED",
            KothScanStatus::Ignored => "IGNORED",
        }
    }
}

/// Response returned for a King-of-the-Hill scan.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KothScanResponse {
    pub status: KothScanStatus,
    pub station_id: Uuid,
    /// Team credited with the scan, when the badge resolved to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
    /// Team that held the station before a capture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_team_id: Option<Uuid>,
    /// Present when the scan was ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ScanIgnoreReason>,
    pub feedback: StationFeedback,
    pub at: String,
}

impl KothScanResponse {
    /// Response for a handover, with the displaced holder when there was one.
    pub fn changed(
        station_id: Uuid,
        team_id: Uuid,
        previous_team_id: Option<Uuid>,
        at: std::time::SystemTime,
    ) -> Self {
        Self {
            status: KothScanStatus::Changed,
            station_id,
            team_id: Some(team_id),
            previous_team_id,
            reason: None,
            feedback: StationFeedback::for_koth(KothScanStatus::Changed),
            at: format_system_time(at),
        }
    }

    /// Response for a scan by the team already holding the station.
    pub fn unchanged(station_id: Uuid, team_id: Uuid, at: std::time::SystemTime) -> Self {
        Self {
            status: KothScanStatus::Unchanged,
            station_id,
            team_id: Some(team_id),
            previous_team_id: None,
            reason: None,
            feedback: StationFeedback::for_koth(KothScanStatus::Unchanged),
            at: format_system_time(at),
        }
    }

    /// Response for an acknowledged no-op.
    pub fn ignored(station_id: Uuid, reason: ScanIgnoreReason, at: std::time::SystemTime) -> Self {
        Self {
            status: KothScanStatus::Ignored,
            station_id,
            team_id: None,
            previous_team_id: None,
            reason: Some(reason),
            feedback: StationFeedback::for_koth(KothScanStatus::Ignored),
            at: format_system_time(at),
        }
    }
}

/// One team's sequence progression as shipped to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgressDto {
    pub team_id: Uuid,
    /// Next required sequence position (ORDERED mode).
    pub idx: usize,
    /// Stations completed so far.
    pub points: u32,
    /// Scans registered toward the current station's requirement.
    pub streak_count: u32,
    /// Armed deadline for the next required scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_expires_at: Option<String>,
    /// Visited stations (FREE mode), sorted.
    pub visited: Vec<Uuid>,
}

impl From<&ProgressSnapshot> for ProgressDto {
    fn from(snapshot: &ProgressSnapshot) -> Self {
        Self {
            team_id: snapshot.team_id,
            idx: snapshot.idx,
            points: snapshot.points,
            streak_count: snapshot.streak_count,
            window_expires_at: snapshot.window_expires_at.map(format_system_time),
            visited: snapshot.visited.clone(),
        }
    }
}

/// Evaluated outcome of a sequence scan, tagged by the `event` field.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanEventDto {
    /// The team advanced or registered a new visit.
    Progress { progress: ProgressDto },
    /// Scan registered toward a multi-scan requirement.
    Holding { progress: ProgressDto },
    /// The scan did not match the expected station.
    WrongOrder { progress: ProgressDto },
    /// The station is cooling down for a defending team.
    DefenderLock {
        locked_until: String,
        progress: ProgressDto,
    },
    /// Repeat visit in FREE mode.
    AlreadyDone { progress: ProgressDto },
    /// The scan completed the sequence and won the session.
    Win { progress: ProgressDto },
    /// The scan was acknowledged but not processed.
    Ignored { reason: ScanIgnoreReason },
}

impl ScanEventDto {
    /// Project an engine evaluation into the wire event.
    pub fn of_evaluation(evaluation: &ScanEvaluation) -> Self {
        let progress = ProgressDto::from(&evaluation.progress);
        match evaluation.outcome {
            ScanOutcome::Progress => ScanEventDto::Progress { progress },
            ScanOutcome::Holding => ScanEventDto::Holding { progress },
            ScanOutcome::WrongOrder => ScanEventDto::WrongOrder { progress },
            ScanOutcome::DefenderLock { locked_until } => ScanEventDto::DefenderLock {
                locked_until: format_system_time(locked_until),
                progress,
            },
            ScanOutcome::AlreadyDone => ScanEventDto::AlreadyDone { progress },
            ScanOutcome::Win => ScanEventDto::Win { progress },
        }
    }

    /// Label recorded in the scan feed and the replay audit log.
    pub fn label(&self) -> &'static str {
        match self {
            ScanEventDto::Progress { .. } => "PROGRESS",
            ScanEventDto::Holding { .. } => "HOLDING",
            ScanEventDto::WrongOrder { .. } => "WRONG_ORDER",
            ScanEventDto::DefenderLock { .. } => "DEFENDER_LOCK",
            ScanEventDto::AlreadyDone { .. } => "ALREADY_DONE",
            ScanEventDto::Win { .. } => "WIN",
            ScanEventDto::Ignored { .. } => "IGNORED",
        }
    }
}

/// LED color a station renders for a scan outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    Green,
    Yellow,
    Red,
    Purple,
    White,
    Blue,
}

/// Blink instruction a station renders after reporting a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StationFeedback {
    pub color: LedColor,
    /// Blink duration in milliseconds.
    pub blink_ms: u32,
}

impl StationFeedback {
    /// Feedback for a sequence scan event. Total over every event, so
    /// firmware always has something to render.
    pub fn for_event(event: &ScanEventDto) -> Self {
        match event {
            ScanEventDto::Progress { .. } => Self {
                color: LedColor::Green,
                blink_ms: 1000,
            },
            ScanEventDto::Holding { .. } => Self {
                color: LedColor::Yellow,
                blink_ms: 300,
            },
            ScanEventDto::WrongOrder { .. } => Self {
                color: LedColor::Red,
                blink_ms: 600,
            },
            ScanEventDto::DefenderLock { .. } => Self {
                color: LedColor::Purple,
                blink_ms: 600,
            },
            ScanEventDto::AlreadyDone { .. } => Self {
                color: LedColor::White,
                blink_ms: 200,
            },
            ScanEventDto::Win { .. } => Self {
                color: LedColor::Green,
                blink_ms: 2000,
            },
            ScanEventDto::Ignored { .. } => Self {
                color: LedColor::Blue,
                blink_ms: 500,
            },
        }
    }

    /// Feedback for a King-of-the-Hill scan status.
    pub fn for_koth(status: KothScanStatus) -> Self {
        match status {
            KothScanStatus::Changed => Self {
                color: LedColor::Green,
                blink_ms: 1000,
            },
            KothScanStatus::Unchanged => Self {
                color: LedColor::Yellow,
                blink_ms: 300,
            },
            KothScanStatus::Ignored => Self {
                color: LedColor::Blue,
                blink_ms: 500,
            },
        }
    }
}

/// Response returned for a sequence scan. Identical bytes are produced when
/// a scan id is replayed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SequenceScanResponse {
    pub scan_id: String,
    #[serde(flatten)]
    pub event: ScanEventDto,
    pub feedback: StationFeedback,
}

impl SequenceScanResponse {
    /// Assemble the response, deriving the LED feedback from the event.
    pub fn new(scan_id: String, event: ScanEventDto) -> Self {
        let feedback = StationFeedback::for_event(&event);
        Self {
            scan_id,
            event,
            feedback,
        }
    }
}

/// Entry of the recent-scans feed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanRecordDto {
    pub rfid_uid: String,
    pub station_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
    pub outcome: String,
    pub at: String,
}

impl From<&ScanRecord> for ScanRecordDto {
    fn from(record: &ScanRecord) -> Self {
        Self {
            rfid_uid: record.rfid_uid.clone(),
            station_id: record.station_id,
            team_id: record.team_id,
            outcome: record.outcome.clone(),
            at: format_system_time(record.at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress() -> ProgressDto {
        ProgressDto {
            team_id: Uuid::from_u128(1),
            idx: 1,
            points: 1,
            streak_count: 0,
            window_expires_at: None,
            visited: Vec::new(),
        }
    }

    #[test]
    fn feedback_matches_the_grid() {
        let cases = [
            (ScanEventDto::Progress { progress: progress() }, LedColor::Green, 1000),
            (ScanEventDto::Holding { progress: progress() }, LedColor::Yellow, 300),
            (ScanEventDto::WrongOrder { progress: progress() }, LedColor::Red, 600),
            (
                ScanEventDto::DefenderLock {
                    locked_until: "2026-01-01T00:00:00Z".into(),
                    progress: progress(),
                },
                LedColor::Purple,
                600,
            ),
            (ScanEventDto::AlreadyDone { progress: progress() }, LedColor::White, 200),
            (ScanEventDto::Win { progress: progress() }, LedColor::Green, 2000),
            (
                ScanEventDto::Ignored {
                    reason: ScanIgnoreReason::UnknownBadge,
                },
                LedColor::Blue,
                500,
            ),
        ];

        for (event, color, blink_ms) in cases {
            let feedback = StationFeedback::for_event(&event);
            assert_eq!(feedback.color, color, "color for {}", event.label());
            assert_eq!(feedback.blink_ms, blink_ms, "blink for {}", event.label());
        }
    }

    #[test]
    fn sequence_response_flattens_the_event_tag() {
        let response = SequenceScanResponse::new(
            "scan-1".into(),
            ScanEventDto::WrongOrder { progress: progress() },
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["scan_id"], "scan-1");
        assert_eq!(json["event"], "WRONG_ORDER");
        assert_eq!(json["feedback"]["color"], "red");
        assert_eq!(json["progress"]["points"], 1);
    }

    #[test]
    fn ignored_reason_uses_snake_case() {
        let response = SequenceScanResponse::new(
            "scan-2".into(),
            ScanEventDto::Ignored {
                reason: ScanIgnoreReason::NoActiveSession,
            },
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["event"], "IGNORED");
        assert_eq!(json["reason"], "no_active_session");
    }
}
