use axum::Router;

use crate::state::SharedState;

pub mod control;
pub mod docs;
pub mod health;
pub mod preferences;
pub mod sse;
pub mod view;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(view::router())
        .merge(control::router())
        .merge(preferences::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
