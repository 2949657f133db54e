use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Outpost Back.
#[openapi(
    paths(
        crate::routes::health::health,
        crate::routes::sse::events,
        crate::routes::scan::koth_scan,
        crate::routes::scan::sequence_scan,
        crate::routes::game::create_game,
        crate::routes::game::list_games,
        crate::routes::game::delete_game,
        crate::routes::game::active_session,
        crate::routes::game::start_session,
        crate::routes::game::stop_session,
        crate::routes::game::session_standings,
        crate::routes::game::session_progress,
        crate::routes::roster::create_team,
        crate::routes::roster::list_teams,
        crate::routes::roster::update_team,
        crate::routes::roster::delete_team,
        crate::routes::roster::create_badge,
        crate::routes::roster::list_badges,
        crate::routes::roster::update_badge,
        crate::routes::roster::delete_badge,
        crate::routes::roster::create_station,
        crate::routes::roster::list_stations,
        crate::routes::roster::update_station,
        crate::routes::roster::delete_station,
        crate::routes::roster::recent_scans,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::SessionSnapshot,
            crate::dto::scan::ScanEventDto,
            crate::dto::scan::StationFeedback,
            crate::dto::scan::LedColor,
            crate::dto::scan::ScanIgnoreReason,
            crate::dao::models::SessionStatus,
        )
    ),
    tags(
        (name = "scan", description = "Scan ingestion from station readers"),
        (name = "session", description = "Session lifecycle, standings and progress"),
        (name = "games", description = "Game definition management"),
        (name = "roster", description = "Teams, badges and stations"),
    )
)]
pub struct ApiDoc;
