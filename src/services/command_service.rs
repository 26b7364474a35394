use tracing::{info, warn};

use crate::{
    dto::{control::CommandResponse, control::SetFlagRequest, view::NoticeLevel},
    error::ServiceError,
    services::sse_events::broadcast_notice,
    state::{
        SharedState,
        race_machine::{Command, ControlAction, Flag, UnknownName},
    },
};

/// Ask the engine to show another flag.
pub async fn set_flag(
    state: &SharedState,
    request: SetFlagRequest,
) -> Result<CommandResponse, ServiceError> {
    let flag: Flag = request
        .flag
        .parse()
        .map_err(|err: UnknownName| ServiceError::InvalidInput(err.to_string()))?;
    execute(state, Command::SetFlag(flag)).await
}

/// Issue a session control action (prep, start, end, abort).
pub async fn control(
    state: &SharedState,
    action: ControlAction,
) -> Result<CommandResponse, ServiceError> {
    execute(state, Command::Control(action)).await
}

async fn execute(state: &SharedState, command: Command) -> Result<CommandResponse, ServiceError> {
    let engine = state.engine();
    let outcome = state
        .run_command(command, || async move {
            engine
                .send_command(command)
                .await
                .map_err(ServiceError::from)
        })
        .await;

    match outcome {
        Ok(banner) => {
            info!(command = %command, "race engine accepted command");
            Ok(CommandResponse {
                command: command.to_string(),
                banner,
            })
        }
        Err(err) => {
            let level = match err {
                ServiceError::Refused(_) | ServiceError::InvalidState(_) => {
                    info!(command = %command, reason = %err, "command refused locally");
                    NoticeLevel::Refused
                }
                _ => {
                    warn!(command = %command, error = %err, "command failed; display reverted");
                    NoticeLevel::Error
                }
            };
            broadcast_notice(state, level, err.notice_message());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::engine::CommandAck,
        dto::sse::ServerEvent,
        services::{
            poller::Poller,
            test_support::{CommandReply, ScriptedEngine, state_with},
        },
        state::race_machine::Phase,
    };

    fn drain(receiver: &mut tokio::sync::broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn named<'a>(events: &'a [ServerEvent], name: &str) -> Vec<&'a ServerEvent> {
        events
            .iter()
            .filter(|event| event.event.as_deref() == Some(name))
            .collect()
    }

    fn flag_request(flag: &str) -> SetFlagRequest {
        SetFlagRequest { flag: flag.into() }
    }

    async fn racing_state(engine: &std::sync::Arc<ScriptedEngine>) -> SharedState {
        engine.push_snapshot(json!({
            "phase": "GREEN",
            "flag": "GREEN",
            "standings": [{"entrant_id": "a1", "number": "12", "name": "Kim", "laps": 3}]
        }));
        engine.push_snapshot(json!({
            "phase": "GREEN",
            "flag": "GREEN",
            "standings": [{"entrant_id": "a1", "number": "12", "name": "Kim", "laps": 4}]
        }));
        let state = state_with(engine.clone(), AppConfig::default());
        let poller = Poller::new(state.clone());
        poller.tick().await;
        poller.tick().await;
        state
    }

    #[tokio::test(start_paused = true)]
    async fn refused_command_never_reaches_engine() {
        let engine = ScriptedEngine::new();
        let state = state_with(engine.clone(), AppConfig::default());
        let mut events = state.view_sse().subscribe();

        let err = set_flag(&state, flag_request("YELLOW")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Refused(_)));
        assert!(engine.commands().is_empty());
        let events = drain(&mut events);
        assert!(named(&events, "banner").is_empty());
        let notices = named(&events, "notice");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].data.contains(r#""level":"refused""#));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_rolls_back_to_last_known_good() {
        let engine = ScriptedEngine::new();
        let state = racing_state(&engine).await;
        engine.push_reply(CommandReply::Reject("flag locked by race director"));
        let mut events = state.view_sse().subscribe();

        let err = set_flag(&state, flag_request("yellow")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Rejected(_)));
        assert_eq!(engine.commands(), vec![Command::SetFlag(Flag::Yellow)]);
        let session = state.session().lock().await;
        assert_eq!(session.machine().flag(), Flag::Green);
        assert!(session.machine().pending().is_none());
        drop(session);

        let events = drain(&mut events);
        let banners = named(&events, "banner");
        assert_eq!(banners.len(), 2);
        assert!(banners[0].data.contains(r#""flag":"YELLOW""#));
        assert!(banners[1].data.contains(r#""flag":"GREEN""#));
        let notices = named(&events, "notice");
        assert!(notices[0].data.contains("flag locked by race director"));
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_flag_stays_and_arms_burst() {
        let engine = ScriptedEngine::new();
        let state = racing_state(&engine).await;

        let response = set_flag(&state, flag_request("RED")).await.unwrap();

        assert_eq!(response.command, "set-flag RED");
        assert_eq!(response.banner.flag, Flag::Red);
        assert!(response.banner.pending.is_none());
        assert!(state.cadence().is_bursting(tokio::time::Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_clears_lap_memory() {
        let engine = ScriptedEngine::new();
        let state = racing_state(&engine).await;
        assert_eq!(state.session().lock().await.laps().feed().count(), 1);
        let mut events = state.view_sse().subscribe();

        control(&state, ControlAction::AbortReset).await.unwrap();

        let session = state.session().lock().await;
        assert!(session.laps().is_empty());
        assert_eq!(session.machine().phase(), Phase::Pre);
        drop(session);
        let events = drain(&mut events);
        let laps = named(&events, "laps");
        assert_eq!(laps.len(), 1);
        assert!(laps[0].data.contains(r#""cleared":true"#));
    }

    #[tokio::test(start_paused = true)]
    async fn start_race_anchors_countdown_from_ack() {
        let engine = ScriptedEngine::new();
        let state = state_with(engine.clone(), AppConfig::default());
        engine.push_reply(CommandReply::Accept(CommandAck {
            countdown: Some(Duration::from_secs(5)),
        }));

        let started = tokio::time::Instant::now();
        let response = control(&state, ControlAction::StartRace).await.unwrap();

        assert_eq!(response.banner.phase, Phase::Countdown);
        let anchor = state
            .session()
            .lock()
            .await
            .machine()
            .countdown_anchor()
            .expect("anchored");
        assert_eq!(anchor - started, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn engine_silence_times_out_and_reverts() {
        let engine = ScriptedEngine::new();
        let state = racing_state(&engine).await;
        engine.push_reply(CommandReply::Hang);

        let err = control(&state, ControlAction::EndRace).await.unwrap_err();

        assert!(matches!(err, ServiceError::Timeout));
        let session = state.session().lock().await;
        assert_eq!(session.machine().phase(), Phase::Green);
        assert!(session.machine().pending().is_none());
    }
}
