use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the last poll of the race engine succeeded.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let online = state.is_online();
    if !online {
        debug!("health requested while race engine is offline");
    }
    HealthResponse::from_engine(online)
}
