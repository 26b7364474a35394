//! Race control binary entrypoint wiring the engine poller, REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use race_control::{
    config::AppConfig,
    dao::{
        engine::HttpRaceEngine,
        preferences::{
            JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences,
        },
    },
    routes,
    services::{clock_refresh, poller::Poller},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let engine = HttpRaceEngine::new(config.engine()).context("building race engine client")?;

    let store: Arc<dyn PreferenceStore> = match &config.preferences_path {
        Some(path) => {
            info!(path = %path.display(), "persisting preferences to file");
            Arc::new(JsonFilePreferenceStore::new(path.clone()))
        }
        None => {
            info!("no preference file configured; preferences will not survive restarts");
            Arc::new(MemoryPreferenceStore::default())
        }
    };

    let app_state = AppState::new(Arc::new(engine), Preferences::new(store), &config);
    if let Err(err) = app_state.restore_preferences().await {
        warn!(error = %err, "failed to restore preferences; using defaults");
    }

    let poller = Poller::new(app_state.clone());
    poller.start();
    let clock_ticker = clock_refresh::spawn(app_state.clone(), config.clock_tick());

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, engine = %config.engine_url, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    let served = axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum");

    poller.stop();
    clock_ticker.abort();
    served
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
