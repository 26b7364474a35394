pub mod cadence;
pub mod clock;
pub mod laps;
pub mod race_machine;
pub mod session;
mod sse;
pub mod standings;

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, Instant, timeout};
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    dao::{
        engine::{CommandAck, RaceEngine},
        preferences::Preferences,
    },
    dto::view::{BannerView, FullView},
    error::ServiceError,
    services::sse_events::{broadcast_full_view, broadcast_render_pass},
    state::{
        cadence::PollCadence,
        clock::ClockMode,
        race_machine::Command,
        session::{DisplaySession, SessionSettings},
    },
};

pub use self::sse::SseHub;

/// Shared handle passed to routes and background tasks.
pub type SharedState = Arc<AppState>;
/// Upper bound on a command round-trip unless configured otherwise.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const VIEW_SSE_CAPACITY: usize = 64;

/// Burst window armed after every operator command.
#[derive(Debug, Clone, Copy)]
pub struct BurstSettings {
    /// Poll interval while the burst lasts.
    pub interval: Duration,
    /// How long the burst lasts.
    pub duration: Duration,
}

/// Central application state: the engine handle, the display session and the
/// view broadcast hub.
pub struct AppState {
    engine: Arc<dyn RaceEngine>,
    preferences: Preferences,
    settings: SessionSettings,
    session: Mutex<DisplaySession>,
    view_sse: SseHub,
    online: AtomicBool,
    race_id: RwLock<Option<String>>,
    cadence: PollCadence,
    burst: BurstSettings,
    command_gate: Mutex<()>,
    command_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The engine is considered offline until the first successful poll.
    pub fn new(
        engine: Arc<dyn RaceEngine>,
        preferences: Preferences,
        config: &AppConfig,
    ) -> SharedState {
        let settings = config.session();
        Arc::new(Self {
            engine,
            preferences,
            settings,
            session: Mutex::new(DisplaySession::new(settings, ClockMode::default())),
            view_sse: SseHub::new(VIEW_SSE_CAPACITY),
            online: AtomicBool::new(false),
            race_id: RwLock::new(None),
            cadence: PollCadence::new(config.poll_interval()),
            burst: BurstSettings {
                interval: config.burst_interval(),
                duration: config.burst_duration(),
            },
            command_gate: Mutex::new(()),
            command_timeout: config.command_timeout(),
        })
    }

    /// Load the persisted clock mode and race selection into the session.
    pub async fn restore_preferences(&self) -> Result<(), ServiceError> {
        let mode = self.preferences.clock_mode().await?;
        let race_id = self.preferences.race_id().await?;
        self.session.lock().await.set_clock_mode(mode, Instant::now());
        *self.race_id.write().await = race_id;
        debug!(clock_mode = mode.as_str(), "restored operator preferences");
        Ok(())
    }

    /// Handle on the race engine.
    pub fn engine(&self) -> Arc<dyn RaceEngine> {
        self.engine.clone()
    }

    /// Persisted operator preferences.
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Display session; hold the lock only for synchronous work.
    pub fn session(&self) -> &Mutex<DisplaySession> {
        &self.session
    }

    /// Broadcast hub feeding every connected view.
    pub fn view_sse(&self) -> &SseHub {
        &self.view_sse
    }

    /// Poll cadence shared with the poller.
    pub fn cadence(&self) -> &PollCadence {
        &self.cadence
    }

    /// Switch to the burst cadence after an operator command.
    pub fn arm_burst(&self, now: Instant) {
        self.cadence
            .burst_poll(self.burst.interval, self.burst.duration, now);
    }

    /// Race currently followed, `None` for the engine's default race.
    pub async fn race_id(&self) -> Option<String> {
        self.race_id.read().await.clone()
    }

    /// Follow another race. The display session starts over so nothing from the
    /// previous race leaks into the new one, and every view is told to repaint.
    ///
    /// Waits for a command in flight to resolve against the session it planned on.
    pub async fn select_race(&self, race_id: Option<String>) -> FullView {
        let _gate = self.command_gate.lock().await;
        *self.race_id.write().await = race_id;
        let mut session = self.session.lock().await;
        let mode = session.clock_mode();
        *session = DisplaySession::new(self.settings, mode);
        let view = session.full_view(Instant::now());
        broadcast_full_view(self, &view);
        drop(session);
        self.cadence.wake();
        view
    }

    /// Last known connectivity of the race engine.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Update the connectivity flag reported by the health check.
    pub fn set_online(&self, value: bool) {
        self.online.store(value, Ordering::SeqCst);
    }

    /// Run one operator command through the optimistic pipeline.
    ///
    /// Commands are serialized through a gate. The command is checked and
    /// applied locally first (refusals never reach `work`), the optimistic state
    /// is broadcast, then `work` talks to the engine. Success confirms the plan,
    /// failure or timeout reverts it to the last known-good signal.
    pub async fn run_command<F, Fut>(
        &self,
        command: Command,
        work: F,
    ) -> Result<BannerView, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CommandAck, ServiceError>>,
    {
        let gate = self.command_gate.lock().await;

        let plan = {
            let mut session = self.session.lock().await;
            let (plan, optimistic) = session.plan_command(command, Instant::now())?;
            broadcast_render_pass(self, optimistic);
            plan
        };
        self.arm_burst(Instant::now());

        let work_future = work();
        let outcome = match self.command_timeout {
            Some(limit) => timeout(limit, work_future)
                .await
                .unwrap_or(Err(ServiceError::Timeout)),
            None => work_future.await,
        };

        let mut session = self.session.lock().await;
        match outcome {
            Ok(ack) => {
                let pass = session.confirm_command(plan.id, ack.countdown, Instant::now())?;
                let banner = session.banner();
                broadcast_render_pass(self, pass);
                drop(session);
                self.cadence.wake();
                drop(gate);
                Ok(banner)
            }
            Err(err) => {
                match session.revert_command(plan.id, Instant::now()) {
                    Ok(pass) => broadcast_render_pass(self, pass),
                    Err(revert_err) => warn!(
                        command = %command,
                        plan_id = %plan.id,
                        error = %revert_err,
                        "failed to revert command"
                    ),
                }
                drop(session);
                drop(gate);
                Err(err)
            }
        }
    }
}
