use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        roster::{
            BadgeSummary, CreateBadgeRequest, CreateStationRequest, CreateTeamRequest,
            StationSummary, TeamSummary, UpdateBadgeRequest, UpdateStationRequest,
            UpdateTeamRequest,
        },
        scan::ScanRecordDto,
    },
    error::AppError,
    services::roster_service,
    state::SharedState,
};

/// Roster management routes: teams, badges, stations and the recent-scans
/// feed.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/teams", get(list_teams).post(create_team))
        .route("/api/teams/{id}", patch(update_team).delete(delete_team))
        .route("/api/badges", get(list_badges).post(create_badge))
        .route(
            "/api/badges/{rfid_uid}",
            patch(update_badge).delete(delete_badge),
        )
        .route("/api/stations", get(list_stations).post(create_station))
        .route(
            "/api/stations/{id}",
            patch(update_station).delete(delete_station),
        )
        .route("/api/scans/recent", get(recent_scans))
}

/// Register a team. An unused roster color is assigned when none is given.
#[utoipa::path(
    post,
    path = "/api/teams",
    tag = "roster",
    request_body = CreateTeamRequest,
    responses((status = 200, description = "Team created", body = TeamSummary))
)]
pub async fn create_team(
    State(state): State<SharedState>,
    Json(payload): Json<CreateTeamRequest>,
) -> Result<Json<TeamSummary>, AppError> {
    payload.validate()?;
    Ok(Json(roster_service::create_team(&state, payload)))
}

/// List registered teams.
#[utoipa::path(
    get,
    path = "/api/teams",
    tag = "roster",
    responses((status = 200, description = "Registered teams", body = [TeamSummary]))
)]
pub async fn list_teams(State(state): State<SharedState>) -> Json<Vec<TeamSummary>> {
    Json(roster_service::list_teams(&state))
}

/// Update a team's name or color.
#[utoipa::path(
    patch,
    path = "/api/teams/{id}",
    tag = "roster",
    params(("id" = Uuid, Path, description = "Identifier of the team to update")),
    request_body = UpdateTeamRequest,
    responses((status = 200, description = "Team updated", body = TeamSummary))
)]
pub async fn update_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTeamRequest>,
) -> Result<Json<TeamSummary>, AppError> {
    payload.validate()?;
    Ok(Json(roster_service::update_team(&state, id, payload)?))
}

/// Delete a team, unassigning its badges.
#[utoipa::path(
    delete,
    path = "/api/teams/{id}",
    tag = "roster",
    params(("id" = Uuid, Path, description = "Identifier of the team to delete")),
    responses((status = 204, description = "Team deleted"))
)]
pub async fn delete_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    roster_service::delete_team(&state, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Register a badge, optionally assigning it to a team.
#[utoipa::path(
    post,
    path = "/api/badges",
    tag = "roster",
    request_body = CreateBadgeRequest,
    responses((status = 200, description = "Badge registered", body = BadgeSummary))
)]
pub async fn create_badge(
    State(state): State<SharedState>,
    Json(payload): Json<CreateBadgeRequest>,
) -> Result<Json<BadgeSummary>, AppError> {
    payload.validate()?;
    Ok(Json(roster_service::create_badge(&state, payload)?))
}

/// List registered badges.
#[utoipa::path(
    get,
    path = "/api/badges",
    tag = "roster",
    responses((status = 200, description = "Registered badges", body = [BadgeSummary]))
)]
pub async fn list_badges(State(state): State<SharedState>) -> Json<Vec<BadgeSummary>> {
    Json(roster_service::list_badges(&state))
}

/// Update a badge's player name or team assignment. An explicit `null`
/// team clears the assignment.
#[utoipa::path(
    patch,
    path = "/api/badges/{rfid_uid}",
    tag = "roster",
    params(("rfid_uid" = String, Path, description = "Tag identifier of the badge to update")),
    request_body = UpdateBadgeRequest,
    responses((status = 200, description = "Badge updated", body = BadgeSummary))
)]
pub async fn update_badge(
    State(state): State<SharedState>,
    Path(rfid_uid): Path<String>,
    Json(payload): Json<UpdateBadgeRequest>,
) -> Result<Json<BadgeSummary>, AppError> {
    Ok(Json(roster_service::update_badge(
        &state, &rfid_uid, payload,
    )?))
}

/// Delete a badge.
#[utoipa::path(
    delete,
    path = "/api/badges/{rfid_uid}",
    tag = "roster",
    params(("rfid_uid" = String, Path, description = "Tag identifier of the badge to delete")),
    responses((status = 204, description = "Badge deleted"))
)]
pub async fn delete_badge(
    State(state): State<SharedState>,
    Path(rfid_uid): Path<String>,
) -> Result<StatusCode, AppError> {
    roster_service::delete_badge(&state, &rfid_uid)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Register a station.
#[utoipa::path(
    post,
    path = "/api/stations",
    tag = "roster",
    request_body = CreateStationRequest,
    responses((status = 200, description = "Station registered", body = StationSummary))
)]
pub async fn create_station(
    State(state): State<SharedState>,
    Json(payload): Json<CreateStationRequest>,
) -> Result<Json<StationSummary>, AppError> {
    payload.validate()?;
    Ok(Json(roster_service::create_station(&state, payload)))
}

/// List registered stations.
#[utoipa::path(
    get,
    path = "/api/stations",
    tag = "roster",
    responses((status = 200, description = "Registered stations", body = [StationSummary]))
)]
pub async fn list_stations(State(state): State<SharedState>) -> Json<Vec<StationSummary>> {
    Json(roster_service::list_stations(&state))
}

/// Update a station's name, location or active flag.
#[utoipa::path(
    patch,
    path = "/api/stations/{id}",
    tag = "roster",
    params(("id" = Uuid, Path, description = "Identifier of the station to update")),
    request_body = UpdateStationRequest,
    responses((status = 200, description = "Station updated", body = StationSummary))
)]
pub async fn update_station(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStationRequest>,
) -> Result<Json<StationSummary>, AppError> {
    payload.validate()?;
    Ok(Json(roster_service::update_station(&state, id, payload)?))
}

/// Delete a station. Running sessions keep their frozen station set.
#[utoipa::path(
    delete,
    path = "/api/stations/{id}",
    tag = "roster",
    params(("id" = Uuid, Path, description = "Identifier of the station to delete")),
    responses((status = 204, description = "Station deleted"))
)]
pub async fn delete_station(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    roster_service::delete_station(&state, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Most recent scans, newest first, bounded by the configured cap.
#[utoipa::path(
    get,
    path = "/api/scans/recent",
    tag = "scan",
    responses((status = 200, description = "Recent scan feed", body = [ScanRecordDto]))
)]
pub async fn recent_scans(State(state): State<SharedState>) -> Json<Vec<ScanRecordDto>> {
    let records = state.recent_scans().await;
    Json(records.iter().map(ScanRecordDto::from).collect())
}
