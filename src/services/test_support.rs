//! Scripted race engine and state builders shared by the service tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::future::BoxFuture;
use reqwest::StatusCode;
use tokio::time::{Duration, sleep};

use crate::{
    config::AppConfig,
    dao::{
        engine::{CommandAck, EngineError, EngineResult, RaceEngine},
        preferences::{MemoryPreferenceStore, Preferences},
    },
    dto::snapshot::RaceSnapshot,
    state::{AppState, SharedState, race_machine::Command},
};

/// What the fake engine answers to the next poll.
pub enum PollReply {
    Snapshot(RaceSnapshot),
    Offline,
}

/// What the fake engine answers to the next command.
pub enum CommandReply {
    Accept(CommandAck),
    /// Accepts once `Duration` has passed.
    AcceptAfter(Duration),
    Reject(&'static str),
    /// Never answers, so the pipeline timeout fires.
    Hang,
}

/// Engine double answering from queued replies.
///
/// When the poll queue is empty the last snapshot is repeated; an empty command
/// queue accepts every command.
#[derive(Default)]
pub struct ScriptedEngine {
    polls: Mutex<VecDeque<PollReply>>,
    last: Mutex<Option<RaceSnapshot>>,
    replies: Mutex<VecDeque<CommandReply>>,
    commands: Mutex<Vec<Command>>,
    race_ids: Mutex<Vec<Option<String>>>,
    fetch_delay: Mutex<Duration>,
    fetches: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_poll(&self, reply: PollReply) {
        self.polls.lock().unwrap().push_back(reply);
    }

    pub fn push_snapshot(&self, json: serde_json::Value) {
        let snapshot = serde_json::from_value(json).expect("snapshot fixture");
        self.push_poll(PollReply::Snapshot(snapshot));
    }

    pub fn push_reply(&self, reply: CommandReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn race_ids(&self) -> Vec<Option<String>> {
        self.race_ids.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn next_poll(&self) -> EngineResult<RaceSnapshot> {
        let reply = self.polls.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match reply {
            Some(PollReply::Snapshot(snapshot)) => {
                *last = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(PollReply::Offline) => Err(offline()),
            None => last.clone().ok_or_else(offline),
        }
    }
}

fn offline() -> EngineError {
    EngineError::RequestStatus {
        path: "race/state".into(),
        status: StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl RaceEngine for ScriptedEngine {
    fn fetch_snapshot(
        &self,
        race_id: Option<String>,
    ) -> BoxFuture<'static, EngineResult<RaceSnapshot>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.race_ids.lock().unwrap().push(race_id);
        let delay = *self.fetch_delay.lock().unwrap();
        let result = self.next_poll();
        Box::pin(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            result
        })
    }

    fn send_command(&self, command: Command) -> BoxFuture<'static, EngineResult<CommandAck>> {
        self.commands.lock().unwrap().push(command);
        let reply = self.replies.lock().unwrap().pop_front();
        Box::pin(async move {
            match reply {
                None => Ok(CommandAck::default()),
                Some(CommandReply::Accept(ack)) => Ok(ack),
                Some(CommandReply::AcceptAfter(delay)) => {
                    sleep(delay).await;
                    Ok(CommandAck::default())
                }
                Some(CommandReply::Reject(message)) => Err(EngineError::Rejected {
                    path: command_path(command),
                    status: StatusCode::OK,
                    message: message.into(),
                }),
                Some(CommandReply::Hang) => futures::future::pending().await,
            }
        })
    }
}

fn command_path(command: Command) -> String {
    match command {
        Command::SetFlag(_) => "race/set-flag".into(),
        Command::Control(action) => format!("race/{}", action.as_str()),
    }
}

/// Shared state wired to `engine` with in-memory preferences.
pub fn state_with(engine: Arc<ScriptedEngine>, config: AppConfig) -> SharedState {
    let preferences = Preferences::new(Arc::new(MemoryPreferenceStore::default()));
    AppState::new(
        engine,
        preferences,
        &AppConfig {
            preferences_path: None,
            ..config
        },
    )
}
