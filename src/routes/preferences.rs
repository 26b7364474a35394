use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use axum_valid::Valid;

use crate::{
    dto::preferences::{ClockModeRequest, PreferencesView, RaceSelectionRequest},
    error::AppError,
    services::preferences_service,
    state::SharedState,
};

/// Persisted operator preferences.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/preferences", get(get_preferences))
        .route("/preferences/clock-mode", put(set_clock_mode))
        .route("/preferences/race", put(select_race))
}

#[utoipa::path(
    get,
    path = "/preferences",
    tag = "preferences",
    responses((status = 200, description = "Current preferences", body = PreferencesView))
)]
pub async fn get_preferences(State(state): State<SharedState>) -> Json<PreferencesView> {
    Json(preferences_service::current(&state).await)
}

/// Switch the clock between remaining and elapsed time.
#[utoipa::path(
    put,
    path = "/preferences/clock-mode",
    tag = "preferences",
    request_body = ClockModeRequest,
    responses(
        (status = 200, description = "Clock mode stored", body = PreferencesView),
        (status = 400, description = "Unknown clock mode")
    )
)]
pub async fn set_clock_mode(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ClockModeRequest>>,
) -> Result<Json<PreferencesView>, AppError> {
    Ok(Json(
        preferences_service::set_clock_mode(&state, payload).await?,
    ))
}

/// Follow another race.
#[utoipa::path(
    put,
    path = "/preferences/race",
    tag = "preferences",
    request_body = RaceSelectionRequest,
    responses(
        (status = 200, description = "Race selection stored", body = PreferencesView),
        (status = 400, description = "Malformed race id")
    )
)]
pub async fn select_race(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RaceSelectionRequest>>,
) -> Result<Json<PreferencesView>, AppError> {
    Ok(Json(preferences_service::select_race(&state, payload).await?))
}
