use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    common::SessionSnapshot,
    game::ControlStandingsResponse,
    scan::{ProgressDto, ScanRecordDto},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across the SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already serialised data field.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when control of a station changes hands.
pub struct ControlChangedEvent {
    pub station_id: Uuid,
    /// Team now holding the station.
    pub team_id: Uuid,
    /// Team that held the station before, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_team_id: Option<Uuid>,
    pub at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast with the refreshed control-time standings.
pub struct StandingsEvent(pub ControlStandingsResponse);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a team's sequence progression changes.
pub struct SequenceProgressEvent {
    pub team_id: Uuid,
    pub station_id: Uuid,
    /// Outcome label of the scan that caused the update.
    pub outcome: String,
    pub progress: ProgressDto,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast when a session starts.
pub struct SessionStartedEvent(pub SessionSnapshot);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a session ends, with or without a winner.
pub struct SessionCompletedEvent {
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_team_id: Option<Uuid>,
    pub ended_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast exactly once when a team wins the session.
pub struct VictoryEvent {
    pub session_id: Uuid,
    pub team_id: Uuid,
    pub team_name: String,
    pub at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast for every scan appended to the feed.
pub struct ScanRecordedEvent(pub ScanRecordDto);
