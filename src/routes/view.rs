use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::view::FullView, services::view_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/view",
    tag = "view",
    responses((status = 200, description = "Complete current view", body = FullView))
)]
/// Return the complete current view for clients that do not stream.
pub async fn current_view(State(state): State<SharedState>) -> Json<FullView> {
    Json(view_service::current_view(&state).await)
}

/// Configure the view routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/view", get(current_view))
}
