use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        common::SessionSnapshot,
        game::{
            ControlStandingsResponse, CreateGameRequest, GameSummary, SequenceProgressResponse,
            StartSessionRequest,
        },
    },
    error::AppError,
    services::{game_service, session_service},
    state::SharedState,
};

/// Routes managing game definitions and the session lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/games", get(list_games).post(create_game))
        .route("/api/games/{id}", delete(delete_game))
        .route("/api/session", get(active_session))
        .route("/api/session/start", post(start_session))
        .route("/api/session/stop", post(stop_session))
        .route("/api/session/standings", get(session_standings))
        .route("/api/session/progress", get(session_progress))
}

/// Register a new game definition.
#[utoipa::path(
    post,
    path = "/api/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = GameSummary),
        (status = 400, description = "Invalid rule set")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<Json<GameSummary>, AppError> {
    payload.validate()?;
    Ok(Json(game_service::create_game(&state, payload)))
}

/// List all game definitions.
#[utoipa::path(
    get,
    path = "/api/games",
    tag = "games",
    responses((status = 200, description = "Known game definitions", body = [GameSummary]))
)]
pub async fn list_games(State(state): State<SharedState>) -> Json<Vec<GameSummary>> {
    Json(game_service::list_games(&state))
}

/// Delete a game definition.
#[utoipa::path(
    delete,
    path = "/api/games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Identifier of the game to delete")),
    responses((status = 204, description = "Game deleted"))
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    game_service::delete_game(&state, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Snapshot of the active session.
#[utoipa::path(
    get,
    path = "/api/session",
    tag = "session",
    responses(
        (status = 200, description = "Active session", body = SessionSnapshot),
        (status = 404, description = "No session is active")
    )
)]
pub async fn active_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(session_service::active_snapshot(&state).await?))
}

/// Start a session from a game definition.
#[utoipa::path(
    post,
    path = "/api/session/start",
    tag = "session",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started", body = SessionSnapshot),
        (status = 409, description = "A session is already active")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    payload.validate()?;
    Ok(Json(session_service::start_session(&state, payload).await?))
}

/// Explicitly end the active session.
#[utoipa::path(
    post,
    path = "/api/session/stop",
    tag = "session",
    responses(
        (status = 200, description = "Final session snapshot", body = SessionSnapshot),
        (status = 404, description = "No session is active")
    )
)]
pub async fn stop_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(session_service::stop_session(&state).await?))
}

/// Control-time standings of the active King-of-the-Hill session.
#[utoipa::path(
    get,
    path = "/api/session/standings",
    tag = "session",
    responses(
        (status = 200, description = "Current standings", body = ControlStandingsResponse),
        (status = 404, description = "No session is active"),
        (status = 409, description = "The active session is not king-of-the-hill")
    )
)]
pub async fn session_standings(
    State(state): State<SharedState>,
) -> Result<Json<ControlStandingsResponse>, AppError> {
    Ok(Json(session_service::control_standings(&state).await?))
}

/// Per-team progress of the active sequence session.
#[utoipa::path(
    get,
    path = "/api/session/progress",
    tag = "session",
    responses(
        (status = 200, description = "Current progress table", body = SequenceProgressResponse),
        (status = 404, description = "No session is active"),
        (status = 409, description = "The active session is not a sequence game")
    )
)]
pub async fn session_progress(
    State(state): State<SharedState>,
) -> Result<Json<SequenceProgressResponse>, AppError> {
    Ok(Json(session_service::sequence_progress(&state).await?))
}
