use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::control::{CommandResponse, SetFlagRequest},
    error::AppError,
    services::command_service,
    state::{SharedState, race_machine::ControlAction},
};

/// Operator commands forwarded to the race engine.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/control/flag", post(set_flag))
        .route("/control/start-prep", post(start_prep))
        .route("/control/start-race", post(start_race))
        .route("/control/end-race", post(end_race))
        .route("/control/abort-reset", post(abort_reset))
}

/// Show another flag.
#[utoipa::path(
    post,
    path = "/control/flag",
    tag = "control",
    request_body = SetFlagRequest,
    responses(
        (status = 200, description = "Flag accepted by the race engine", body = CommandResponse),
        (status = 400, description = "Unknown flag name"),
        (status = 409, description = "Flag not allowed in the current phase"),
        (status = 502, description = "Race engine rejected the flag"),
        (status = 504, description = "Race engine did not answer in time")
    )
)]
pub async fn set_flag(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SetFlagRequest>>,
) -> Result<Json<CommandResponse>, AppError> {
    Ok(Json(command_service::set_flag(&state, payload).await?))
}

/// Enter pre-race staging.
#[utoipa::path(
    post,
    path = "/control/start-prep",
    tag = "control",
    responses(
        (status = 200, description = "Staging started", body = CommandResponse),
        (status = 409, description = "Not allowed in the current phase"),
        (status = 502, description = "Race engine rejected the command")
    )
)]
pub async fn start_prep(
    State(state): State<SharedState>,
) -> Result<Json<CommandResponse>, AppError> {
    Ok(Json(
        command_service::control(&state, ControlAction::StartPrep).await?,
    ))
}

/// Start the race, usually through a countdown.
#[utoipa::path(
    post,
    path = "/control/start-race",
    tag = "control",
    responses(
        (status = 200, description = "Race start accepted", body = CommandResponse),
        (status = 409, description = "Not allowed in the current phase"),
        (status = 502, description = "Race engine rejected the command")
    )
)]
pub async fn start_race(
    State(state): State<SharedState>,
) -> Result<Json<CommandResponse>, AppError> {
    Ok(Json(
        command_service::control(&state, ControlAction::StartRace).await?,
    ))
}

/// Finish the race.
#[utoipa::path(
    post,
    path = "/control/end-race",
    tag = "control",
    responses(
        (status = 200, description = "Race finished", body = CommandResponse),
        (status = 409, description = "Not allowed in the current phase"),
        (status = 502, description = "Race engine rejected the command")
    )
)]
pub async fn end_race(
    State(state): State<SharedState>,
) -> Result<Json<CommandResponse>, AppError> {
    Ok(Json(
        command_service::control(&state, ControlAction::EndRace).await?,
    ))
}

/// Abort the session and return to staging.
#[utoipa::path(
    post,
    path = "/control/abort-reset",
    tag = "control",
    responses(
        (status = 200, description = "Session aborted", body = CommandResponse),
        (status = 409, description = "Not allowed in the current phase"),
        (status = 502, description = "Race engine rejected the command")
    )
)]
pub async fn abort_reset(
    State(state): State<SharedState>,
) -> Result<Json<CommandResponse>, AppError> {
    Ok(Json(
        command_service::control(&state, ControlAction::AbortReset).await?,
    ))
}
