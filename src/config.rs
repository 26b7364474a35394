//! Application-level configuration loading: engine location, cadences and view sizing.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::{dao::engine::EngineConfig, state::session::SessionSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/race-control.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RACE_CONTROL_CONFIG_PATH";
/// Environment variable that overrides the engine base URL from the file.
const ENGINE_URL_ENV: &str = "ENGINE_URL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Base URL of the race engine.
    pub engine_url: String,
    /// Normal poll cadence.
    pub poll_interval_ms: u64,
    /// Poll cadence right after an operator command.
    pub burst_interval_ms: u64,
    /// How long the burst cadence lasts.
    pub burst_duration_ms: u64,
    /// Timeout for a single engine request.
    pub request_timeout_ms: u64,
    /// Upper bound on a whole command round-trip.
    pub command_timeout_ms: u64,
    /// Repaint period for the locally extrapolated countdown.
    pub clock_tick_ms: u64,
    /// Rows the tables are padded to.
    pub viewport_rows: usize,
    /// Lap events kept in the feed.
    pub feed_capacity: usize,
    /// Countdown length assumed until the engine reports one.
    pub countdown_s: u64,
    /// JSON file holding the operator preferences; `null` keeps them in memory.
    pub preferences_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        engine = %config.engine_url,
                        "loaded race control config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env::var(ENGINE_URL_ENV).ok().filter(|url| !url.is_empty()) {
            info!(engine = %url, "engine url overridden from environment");
            self.engine_url = url;
        }
        self
    }

    /// Normal poll cadence, never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Burst poll cadence, never zero.
    pub fn burst_interval(&self) -> Duration {
        Duration::from_millis(self.burst_interval_ms.max(1))
    }

    /// Length of a burst window.
    pub fn burst_duration(&self) -> Duration {
        Duration::from_millis(self.burst_duration_ms)
    }

    /// Command round-trip bound; `None` when disabled with `0`.
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_ms > 0).then(|| Duration::from_millis(self.command_timeout_ms))
    }

    /// Countdown repaint period.
    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.clock_tick_ms.max(10))
    }

    /// Settings for the engine HTTP client.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig::new(
            self.engine_url.clone(),
            Duration::from_millis(self.request_timeout_ms.max(1)),
        )
    }

    /// Sizing knobs for the display session.
    pub fn session(&self) -> SessionSettings {
        SessionSettings {
            countdown: Duration::from_secs(self.countdown_s),
            viewport_rows: self.viewport_rows,
            feed_capacity: self.feed_capacity.max(1),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine_url: "http://127.0.0.1:5000".into(),
            poll_interval_ms: 1000,
            burst_interval_ms: 250,
            burst_duration_ms: 4000,
            request_timeout_ms: 2500,
            command_timeout_ms: 5000,
            clock_tick_ms: 200,
            viewport_rows: 16,
            feed_capacity: crate::state::laps::DEFAULT_FEED_CAPACITY,
            countdown_s: 10,
            preferences_path: Some(PathBuf::from("config/preferences.json")),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
