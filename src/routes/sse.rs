use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/api/events",
    responses((status = 200, description = "Realtime event stream", content_type = "text/event-stream", body = String))
)]
/// Stream realtime game events to scoreboards and operator consoles.
pub async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state);
    let handshake = sse_service::handshake(&state);
    info!("new SSE connection");
    sse_service::to_sse_stream(handshake, receiver)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/api/events", get(events))
}
