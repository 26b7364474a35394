use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/view",
    tag = "sse",
    responses((status = 200, description = "Handshake with the full view, then render-pass events (clock, banner, standings, seen, laps, connectivity, notice, cue, view)", content_type = "text/event-stream", body = String))
)]
/// Stream render passes to a connected control surface.
pub async fn view_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (handshake, receiver) = sse_service::subscribe_view(&state).await;
    info!(
        subscribers = state.view_sse().subscribers(),
        "New view SSE connection"
    );
    sse_service::to_sse_stream(handshake, receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/view", get(view_stream))
}
