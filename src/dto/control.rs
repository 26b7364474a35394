//! DTO definitions used by the operator command routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::{validation::validate_flag_name, view::BannerView};

/// Request to change the displayed flag.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetFlagRequest {
    /// Flag name, e.g. `YELLOW` (case-insensitive).
    #[validate(custom(function = "validate_flag_name"))]
    pub flag: String,
}

/// Outcome of a command the engine accepted.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandResponse {
    /// Command as sent to the engine.
    pub command: String,
    /// Banner after the command was confirmed.
    pub banner: BannerView,
}
