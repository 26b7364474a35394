use tokio::time::Instant;
use tracing::info;

use crate::{
    dto::preferences::{ClockModeRequest, PreferencesView, RaceSelectionRequest},
    error::ServiceError,
    services::sse_events::broadcast_clock,
    state::SharedState,
};

/// Current operator preferences.
pub async fn current(state: &SharedState) -> PreferencesView {
    PreferencesView {
        clock_mode: state.session().lock().await.clock_mode(),
        race_id: state.race_id().await,
    }
}

/// Persist the clock mode and repaint the clock when the display changes.
///
/// While the mode is locked the preference is still stored; it takes effect once
/// both durations are reported again.
pub async fn set_clock_mode(
    state: &SharedState,
    request: ClockModeRequest,
) -> Result<PreferencesView, ServiceError> {
    state.preferences().set_clock_mode(request.mode).await?;
    let clock = state
        .session()
        .lock()
        .await
        .set_clock_mode(request.mode, Instant::now());
    if let Some(clock) = clock {
        broadcast_clock(state, &clock);
    }
    info!(mode = request.mode.as_str(), "clock mode changed");
    Ok(current(state).await)
}

/// Persist the followed race and start over on it.
pub async fn select_race(
    state: &SharedState,
    request: RaceSelectionRequest,
) -> Result<PreferencesView, ServiceError> {
    let race_id = Some(request.race_id);
    if state.race_id().await == race_id {
        return Ok(current(state).await);
    }
    state.preferences().set_race_id(race_id.clone()).await?;
    state.select_race(race_id.clone()).await;
    info!(race_id = ?race_id, "following another race");
    Ok(current(state).await)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        services::{
            poller::Poller,
            test_support::{ScriptedEngine, state_with},
        },
        dto::control::SetFlagRequest,
        services::{command_service, test_support::CommandReply},
        state::{
            clock::ClockMode,
            race_machine::{Flag, Phase},
        },
    };

    #[tokio::test(start_paused = true)]
    async fn clock_mode_is_persisted_and_repainted() {
        let engine = ScriptedEngine::new();
        engine.push_snapshot(json!({"phase": "GREEN", "elapsed_s": 65.2, "remaining_s": 1734.9}));
        let state = state_with(engine, AppConfig::default());
        Poller::new(state.clone()).tick().await;
        let mut events = state.view_sse().subscribe();

        let view = set_clock_mode(
            &state,
            ClockModeRequest {
                mode: ClockMode::Elapsed,
            },
        )
        .await
        .unwrap();

        assert_eq!(view.clock_mode, ClockMode::Elapsed);
        assert_eq!(
            state.preferences().clock_mode().await.unwrap(),
            ClockMode::Elapsed
        );
        let event = events.try_recv().expect("clock repaint");
        assert!(event.data.contains(r#""display":"00:01:05""#));
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_a_race_resets_the_view() {
        let engine = ScriptedEngine::new();
        engine.push_snapshot(json!({
            "phase": "GREEN",
            "standings": [{"entrant_id": 1, "laps": 2}]
        }));
        let state = state_with(engine, AppConfig::default());
        Poller::new(state.clone()).tick().await;

        let view = select_race(
            &state,
            RaceSelectionRequest {
                race_id: "heat-3".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(view.race_id.as_deref(), Some("heat-3"));
        assert_eq!(
            state.preferences().race_id().await.unwrap().as_deref(),
            Some("heat-3")
        );
        assert!(state.session().lock().await.standings().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn race_switch_waits_for_command_in_flight() {
        let engine = ScriptedEngine::new();
        engine.push_snapshot(json!({"phase": "GREEN", "flag": "GREEN"}));
        engine.push_reply(CommandReply::AcceptAfter(Duration::from_millis(300)));
        let state = state_with(engine, AppConfig::default());
        Poller::new(state.clone()).tick().await;

        let command = {
            let state = state.clone();
            tokio::spawn(async move {
                command_service::set_flag(
                    &state,
                    SetFlagRequest {
                        flag: "YELLOW".into(),
                    },
                )
                .await
            })
        };
        tokio::task::yield_now().await;

        select_race(
            &state,
            RaceSelectionRequest {
                race_id: "heat-4".into(),
            },
        )
        .await
        .unwrap();

        let response = command.await.unwrap().expect("accepted command");
        assert_eq!(response.banner.flag, Flag::Yellow);
        let session = state.session().lock().await;
        assert!(session.machine().pending().is_none());
        assert_eq!(session.machine().phase(), Phase::Pre);
    }
}
