use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the last poll of the race engine succeeded.
    pub engine_online: bool,
}

impl HealthResponse {
    /// Build the response from the engine connectivity flag.
    pub fn from_engine(online: bool) -> Self {
        Self {
            status: if online { "ok" } else { "degraded" }.to_string(),
            engine_online: online,
        }
    }
}
