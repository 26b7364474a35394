//! The only periodic driver: fetches the race state and fans it out to the
//! display session.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use tokio::{
    sync::{Mutex, Notify},
    time::{Instant, sleep},
};
use tracing::{debug, info, warn};

use crate::{
    services::sse_events::{broadcast_connectivity, broadcast_render_pass},
    state::SharedState,
};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A snapshot was applied and broadcast.
    Applied,
    /// The fetch failed; the last display is kept.
    Failed,
    /// The answer arrived after `stop()` or a race switch and was dropped.
    Discarded,
}

struct PollerInner {
    generation: AtomicU64,
    running: AtomicBool,
    stopped: Notify,
    in_flight: Mutex<()>,
}

/// Self-chaining poll loop over the shared state.
#[derive(Clone)]
pub struct Poller {
    state: SharedState,
    inner: Arc<PollerInner>,
}

impl Poller {
    /// Idle poller over `state`; call [`Self::start`] to begin.
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            inner: Arc::new(PollerInner {
                generation: AtomicU64::new(0),
                running: AtomicBool::new(false),
                stopped: Notify::new(),
                in_flight: Mutex::new(()),
            }),
        }
    }

    /// Start polling, ticking immediately. Calling it while running is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, "race state poller started");
        tokio::spawn(self.clone().run(generation));
    }

    /// Cancel the next scheduled tick. A fetch already in flight completes but
    /// its answer is discarded. Safe to call repeatedly.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.stopped.notify_waiters();
        info!("race state poller stopped");
    }

    /// Whether the loop is scheduled.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Run one fetch-and-apply cycle outside the schedule.
    pub async fn tick(&self) -> TickOutcome {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.tick_for(generation).await
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    async fn run(self, generation: u64) {
        while self.is_current(generation) {
            let outcome = self.tick_for(generation).await;
            if !self.is_current(generation) {
                break;
            }

            let cadence = self.state.cadence();
            // A failed poll backs off to the normal cadence even inside a burst.
            let delay = match outcome {
                TickOutcome::Failed => cadence.normal(),
                TickOutcome::Applied | TickOutcome::Discarded => cadence.current(Instant::now()),
            };
            tokio::select! {
                _ = sleep(delay) => {}
                _ = cadence.woken() => {}
                _ = self.inner.stopped.notified() => {}
            }
        }
        debug!(generation, "race state poll loop exited");
    }

    async fn tick_for(&self, generation: u64) -> TickOutcome {
        // Single-flight: a woken loop never overlaps a tick in progress.
        let _flight = self.inner.in_flight.lock().await;

        let race_id = self.state.race_id().await;
        let result = self.state.engine().fetch_snapshot(race_id.clone()).await;

        if !self.is_current(generation) {
            debug!("dropping race state fetched after stop");
            return TickOutcome::Discarded;
        }
        // Broadcast under the session lock so passes go out in the order they
        // were computed.
        let mut session = self.state.session().lock().await;
        if self.state.race_id().await != race_id {
            debug!("dropping race state fetched for a previous race");
            return TickOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                let pass = session.apply_snapshot(&snapshot, Instant::now());
                self.state.set_online(true);
                broadcast_render_pass(&self.state, pass);
                TickOutcome::Applied
            }
            Err(err) => {
                let went_offline = session.mark_offline();
                self.state.set_online(false);
                if went_offline {
                    warn!(error = %err, "race engine unreachable; keeping last display");
                    broadcast_connectivity(&self.state, false);
                } else {
                    debug!(error = %err, "race engine still unreachable");
                }
                TickOutcome::Failed
            }
        }
    }
}
