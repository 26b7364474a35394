//! Normal and burst polling cadence.

use std::sync::{Mutex, PoisonError};

use tokio::{
    sync::Notify,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy)]
struct Burst {
    interval: Duration,
    until: Instant,
}

/// Decides how long the poller sleeps between ticks.
///
/// A burst is a time-boxed shorter interval armed after operator commands. It
/// expires by timestamp comparison, so no timer has to be cancelled.
#[derive(Debug)]
pub struct PollCadence {
    normal: Duration,
    burst: Mutex<Option<Burst>>,
    wake: Notify,
}

impl PollCadence {
    /// Cadence polling every `normal` until a burst is armed.
    pub fn new(normal: Duration) -> Self {
        Self {
            normal,
            burst: Mutex::new(None),
            wake: Notify::new(),
        }
    }

    /// Interval used outside bursts and after failed polls.
    pub fn normal(&self) -> Duration {
        self.normal
    }

    /// Poll every `interval` until `now + duration`, then fall back to normal.
    ///
    /// Re-arming keeps the later deadline and the shorter interval of an active
    /// burst. A sleeping poller is woken so the new cadence applies right away.
    pub fn burst_poll(&self, interval: Duration, duration: Duration, now: Instant) {
        let until = now + duration;
        {
            let mut burst = self.burst.lock().unwrap_or_else(PoisonError::into_inner);
            *burst = Some(match *burst {
                Some(active) if active.until > now => Burst {
                    interval: active.interval.min(interval),
                    until: active.until.max(until),
                },
                _ => Burst { interval, until },
            });
        }
        self.wake.notify_one();
    }

    /// Interval to wait before the next tick.
    pub fn current(&self, now: Instant) -> Duration {
        let burst = self.burst.lock().unwrap_or_else(PoisonError::into_inner);
        match *burst {
            Some(active) if now < active.until => active.interval.min(self.normal),
            _ => self.normal,
        }
    }

    /// Whether a burst window is active at `now`.
    pub fn is_bursting(&self, now: Instant) -> bool {
        let burst = self.burst.lock().unwrap_or_else(PoisonError::into_inner);
        burst.is_some_and(|active| now < active.until)
    }

    /// Ask a sleeping poller to tick now.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Resolves when [`Self::wake`] or [`Self::burst_poll`] was called.
    pub async fn woken(&self) {
        self.wake.notified().await;
    }
}
