use tokio::{
    task::JoinHandle,
    time::{Duration, Instant, MissedTickBehavior, interval},
};

use crate::{services::sse_events::broadcast_clock, state::SharedState};

/// Repaint the clock between polls while a countdown is extrapolated locally.
///
/// Outside a countdown the displayed value only moves with snapshots, so the
/// ticker does nothing.
pub fn spawn(state: SharedState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            refresh(&state).await;
        }
    })
}

/// One repaint; returns whether a clock event was sent.
pub async fn refresh(state: &SharedState) -> bool {
    let mut session = state.session().lock().await;
    if !session.is_counting_down() {
        return false;
    }
    match session.refresh_clock(Instant::now()) {
        Some(clock) => {
            broadcast_clock(state, &clock);
            true
        }
        None => false,
    }
}
