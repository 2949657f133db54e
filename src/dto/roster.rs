//! Request and response payloads for the roster: teams, badges and stations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        format_system_time,
        validation::{validate_hex_color, validate_rfid_uid},
    },
    state::game::{Badge, Station, Team},
};

/// Payload used to register a new team.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTeamRequest {
    pub name: String,
    /// Optional hex color. If omitted, the backend picks the first unused
    /// color from the configured colors set.
    #[serde(default)]
    pub color: Option<String>,
}

impl Validate for CreateTeamRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", non_empty_error("team name must not be empty"));
        }
        if let Some(ref color) = self.color {
            if let Err(e) = validate_hex_color(color) {
                errors.add("color", e);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to rename or recolor a team.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTeamRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl Validate for UpdateTeamRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                errors.add("name", non_empty_error("team name must not be empty"));
            }
        }
        if let Some(ref color) = self.color {
            if let Err(e) = validate_hex_color(color) {
                errors.add("color", e);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to register a badge ahead of time.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBadgeRequest {
    pub rfid_uid: String,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub team_id: Option<Uuid>,
}

impl Validate for CreateBadgeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_rfid_uid(&self.rfid_uid) {
            errors.add("rfid_uid", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to update a badge.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBadgeRequest {
    /// If not specified, the player name is left unchanged. If null is
    /// specified, the name is cleared.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub player_name: Option<Option<String>>,
    /// If not specified, the assignment is left unchanged. If null is
    /// specified, the badge is unassigned from its team.
    #[serde(default)]
    #[schema(value_type = Option<Uuid>)]
    pub team_id: Option<Option<Uuid>>,
}

/// Payload used to register a station.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateStationRequest {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Defaults to true.
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Validate for CreateStationRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", non_empty_error("station name must not be empty"));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to update a station.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStationRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// If not specified, the location is left unchanged. If null is
    /// specified, the location is cleared.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Validate for UpdateStationRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                errors.add("name", non_empty_error("station name must not be empty"));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Public projection of a team exposed to REST/SSE clients.
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Public projection of a badge.
pub struct BadgeSummary {
    pub rfid_uid: String,
    pub player_name: Option<String>,
    pub team_id: Option<Uuid>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Public projection of a station.
pub struct StationSummary {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub is_active: bool,
}

impl From<&Team> for TeamSummary {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            color: team.color.clone(),
            updated_at: format_system_time(team.updated_at),
        }
    }
}

impl From<&Badge> for BadgeSummary {
    fn from(badge: &Badge) -> Self {
        Self {
            rfid_uid: badge.rfid_uid.clone(),
            player_name: badge.player_name.clone(),
            team_id: badge.team_id,
            created_at: format_system_time(badge.created_at),
        }
    }
}

impl From<&Station> for StationSummary {
    fn from(station: &Station) -> Self {
        Self {
            id: station.id,
            name: station.name.clone(),
            location: station.location.clone(),
            is_active: station.is_active,
        }
    }
}

fn non_empty_error(message: &'static str) -> validator::ValidationError {
    let mut err = validator::ValidationError::new("non_empty");
    err.message = Some(message.into());
    err
}
