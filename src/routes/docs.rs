use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

const OPENAPI_JSON_PATH: &str = "/api-doc/openapi.json";

/// Serve the Swagger UI for the control surface API at `/docs`.
pub fn router(state: SharedState) -> Router<SharedState> {
    let mut doc = ApiDoc::openapi();
    doc.info.title = "race-control".into();
    doc.info.version = env!("CARGO_PKG_VERSION").into();

    let ui: Router<SharedState> = SwaggerUi::new("/docs").url(OPENAPI_JSON_PATH, doc).into();
    ui.with_state(state)
}
