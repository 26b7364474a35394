//! DTO definitions for the persisted operator preferences.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_race_id, state::clock::ClockMode};

/// Request to switch between remaining and elapsed time.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ClockModeRequest {
    /// Mode to display while the race runs.
    pub mode: ClockMode,
}

/// Request to follow another race.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RaceSelectionRequest {
    /// Engine id of the race.
    #[validate(custom(function = "validate_race_id"))]
    pub race_id: String,
}

/// Current operator preferences.
#[derive(Debug, Serialize, ToSchema)]
pub struct PreferencesView {
    /// Preferred clock mode.
    pub clock_mode: ClockMode,
    /// Followed race; absent for the engine's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_id: Option<String>,
}
