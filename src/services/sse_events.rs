use std::time::SystemTime;

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        format_system_time,
        sse::ServerEvent,
        view::{
            ClockView, ConnectivityEvent, FullView, LapsEvent, NoticeEvent, NoticeLevel,
            TablePatchEvent,
        },
    },
    state::{AppState, session::RenderPass},
};

pub const EVENT_CLOCK: &str = "clock";
pub const EVENT_BANNER: &str = "banner";
pub const EVENT_STANDINGS: &str = "standings";
pub const EVENT_SEEN: &str = "seen";
pub const EVENT_LAPS: &str = "laps";
pub const EVENT_CONNECTIVITY: &str = "connectivity";
pub const EVENT_NOTICE: &str = "notice";
pub const EVENT_CUE: &str = "cue";
pub const EVENT_VIEW: &str = "view";

/// Publish everything a render pass changed. Sections that did not change are
/// not sent.
pub fn broadcast_render_pass(state: &AppState, pass: RenderPass) {
    if pass.reconnected {
        broadcast_connectivity(state, true);
    }
    if let Some(clock) = &pass.clock {
        broadcast_clock(state, clock);
    }
    if let Some(banner) = &pass.banner {
        send_view_event(state, EVENT_BANNER, banner);
    }
    for cue in &pass.cues {
        send_view_event(state, EVENT_CUE, cue);
    }
    if !pass.laps.is_empty() || pass.laps_cleared {
        send_view_event(
            state,
            EVENT_LAPS,
            &LapsEvent {
                events: pass.laps,
                cleared: pass.laps_cleared,
            },
        );
    }
    if !pass.standings.is_empty() {
        send_view_event(state, EVENT_STANDINGS, &TablePatchEvent(pass.standings));
    }
    if !pass.seen.is_empty() {
        send_view_event(state, EVENT_SEEN, &TablePatchEvent(pass.seen));
    }
}

/// Broadcast a clock repaint.
pub fn broadcast_clock(state: &AppState, clock: &ClockView) {
    send_view_event(state, EVENT_CLOCK, clock);
}

/// Broadcast the engine connectivity indicator.
pub fn broadcast_connectivity(state: &AppState, online: bool) {
    send_view_event(state, EVENT_CONNECTIVITY, &ConnectivityEvent { online });
}

/// Broadcast a short operator notice.
pub fn broadcast_notice(state: &AppState, level: NoticeLevel, message: impl Into<String>) {
    let payload = NoticeEvent {
        level,
        message: message.into(),
        at: format_system_time(SystemTime::now()),
    };
    send_view_event(state, EVENT_NOTICE, &payload);
}

/// Ask every view to repaint from scratch.
pub fn broadcast_full_view(state: &AppState, view: &FullView) {
    send_view_event(state, EVENT_VIEW, view);
}

fn send_view_event(state: &AppState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.view_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize view SSE payload"),
    }
}
