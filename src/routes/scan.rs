use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::scan::{KothScanResponse, ScanRequest, SequenceScanRequest, SequenceScanResponse},
    error::AppError,
    services::{scan_service, sequence_service},
    state::SharedState,
};

/// Routes accepting scan reports from station readers.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/scan", post(koth_scan))
        .route("/api/sequence/scan", post(sequence_scan))
}

/// Process a King-of-the-Hill capture scan.
///
/// Scans that cannot be applied (no active session, unknown badge, foreign
/// station) are acknowledged with an `ignored` status rather than an error,
/// so station firmware never has to distinguish failure modes.
#[utoipa::path(
    post,
    path = "/api/scan",
    tag = "scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan processed, including soft-ignored scans", body = KothScanResponse),
        (status = 400, description = "Malformed scan payload")
    )
)]
pub async fn koth_scan(
    State(state): State<SharedState>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<KothScanResponse>, AppError> {
    payload.validate()?;
    Ok(Json(scan_service::handle_koth_scan(&state, payload).await))
}

/// Process a sequence-mode scan carrying its idempotency key.
#[utoipa::path(
    post,
    path = "/api/sequence/scan",
    tag = "scan",
    request_body = SequenceScanRequest,
    responses(
        (status = 200, description = "Scan evaluated; replays return the original outcome", body = SequenceScanResponse),
        (status = 400, description = "Malformed scan payload")
    )
)]
pub async fn sequence_scan(
    State(state): State<SharedState>,
    Json(payload): Json<SequenceScanRequest>,
) -> Result<Json<SequenceScanResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        sequence_service::handle_sequence_scan(&state, payload).await,
    ))
}
