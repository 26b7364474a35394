pub mod error;
pub mod http;

use futures::future::BoxFuture;
use tokio::time::Duration;

use crate::{dto::snapshot::RaceSnapshot, state::race_machine::Command};

pub use self::error::{EngineError, EngineResult};
pub use self::http::{EngineConfig, HttpRaceEngine};

/// What the engine said when it accepted a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandAck {
    /// Countdown length, when the command started one.
    pub countdown: Option<Duration>,
}

/// Abstraction over the authoritative race engine.
pub trait RaceEngine: Send + Sync {
    /// Fetch the current race state, optionally for a specific race.
    fn fetch_snapshot(&self, race_id: Option<String>)
    -> BoxFuture<'static, EngineResult<RaceSnapshot>>;
    /// Fire a command; the new state is only visible through the next snapshot.
    fn send_command(&self, command: Command) -> BoxFuture<'static, EngineResult<CommandAck>>;
}
