use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the race control service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::view_stream,
        crate::routes::view::current_view,
        crate::routes::control::set_flag,
        crate::routes::control::start_prep,
        crate::routes::control::start_race,
        crate::routes::control::end_race,
        crate::routes::control::abort_reset,
        crate::routes::preferences::get_preferences,
        crate::routes::preferences::set_clock_mode,
        crate::routes::preferences::select_race,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::control::SetFlagRequest,
            crate::dto::control::CommandResponse,
            crate::dto::preferences::ClockModeRequest,
            crate::dto::preferences::RaceSelectionRequest,
            crate::dto::preferences::PreferencesView,
            crate::dto::sse::Handshake,
            crate::dto::view::FullView,
            crate::dto::view::ClockView,
            crate::dto::view::BannerView,
            crate::dto::view::PendingView,
            crate::dto::view::CueEvent,
            crate::dto::view::CueKind,
            crate::dto::view::LapsEvent,
            crate::dto::view::ConnectivityEvent,
            crate::dto::view::NoticeEvent,
            crate::dto::view::NoticeLevel,
            crate::dto::view::TablePatchEvent,
            crate::state::standings::RowPatch,
            crate::state::standings::RowOp,
            crate::state::standings::CellChange,
            crate::state::standings::RenderedTable,
            crate::state::standings::RenderedRow,
            crate::state::laps::LapEvent,
            crate::state::race_machine::Phase,
            crate::state::race_machine::Flag,
            crate::state::race_machine::ControlAction,
            crate::state::clock::ClockMode,
            crate::state::clock::ClockSource,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "view", description = "Current view snapshot"),
        (name = "control", description = "Operator commands forwarded to the race engine"),
        (name = "preferences", description = "Persisted operator preferences"),
    )
)]
pub struct ApiDoc;
