//! View payloads pushed to the operator surface.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    clock::{ClockMode, ClockSource},
    laps::LapEvent,
    race_machine::{ControlAction, Flag, Phase},
    standings::{RenderedTable, RowPatch},
};

/// Canonical clock as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClockView {
    /// `HH:MM:SS`, prefixed with `-` while counting down.
    pub display: String,
    /// Signed milliseconds behind `display`.
    pub millis: i64,
    /// Rule that produced the reading.
    pub source: ClockSource,
    /// Mode in effect for this reading.
    pub mode: ClockMode,
    /// When set the mode toggle must be disabled.
    pub mode_locked: bool,
    /// Session cap summary, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

/// Command waiting for the engine's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PendingView {
    /// Command as sent to the engine.
    pub command: String,
    /// Phase presented once the command lands.
    pub phase: Phase,
    /// Flag presented once the command lands.
    pub flag: Flag,
}

/// Phase/flag banner together with the controls it enables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BannerView {
    /// Presented phase.
    pub phase: Phase,
    /// Presented flag.
    pub flag: Flag,
    /// Command waiting for the engine, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingView>,
    /// Flags the operator may request right now.
    pub allowed_flags: Vec<Flag>,
    /// Control actions the operator may request right now.
    pub allowed_controls: Vec<ControlAction>,
    /// Increments on every presented change.
    pub version: usize,
}

/// Kind of transition announced on the cue side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    /// The phase changed.
    Phase,
    /// The flag changed.
    Flag,
}

/// Phase or flag transition for the audio cue subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CueEvent {
    /// What changed.
    pub kind: CueKind,
    /// Wire name of the new phase or flag.
    pub value: String,
}

impl CueEvent {
    /// Cue for entering `phase`.
    pub fn phase(phase: Phase) -> Self {
        Self {
            kind: CueKind::Phase,
            value: phase.to_string(),
        }
    }

    /// Cue for showing `flag`.
    pub fn flag(flag: Flag) -> Self {
        Self {
            kind: CueKind::Flag,
            value: flag.to_string(),
        }
    }
}

/// Incremental update for one of the tables.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TablePatchEvent(pub RowPatch);

/// Newly completed laps, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct LapsEvent {
    /// Laps completed in this pass.
    pub events: Vec<LapEvent>,
    /// Set when the feed was wiped before these events.
    pub cleared: bool,
}

/// Connectivity indicator.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectivityEvent {
    /// Whether the last poll reached the engine.
    pub online: bool,
}

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// A command was refused locally.
    Refused,
    /// The engine rejected a command or could not be reached.
    Error,
}

/// Short, non-blocking message for the operator.
#[derive(Debug, Serialize, ToSchema)]
pub struct NoticeEvent {
    /// Severity.
    pub level: NoticeLevel,
    /// Text shown to the operator.
    pub message: String,
    /// RFC 3339 time the notice was raised.
    pub at: String,
}

/// Everything a freshly connected surface needs to paint itself.
#[derive(Debug, Serialize, ToSchema)]
pub struct FullView {
    /// Current clock.
    pub clock: ClockView,
    /// Phase/flag banner.
    pub banner: BannerView,
    /// Standings table.
    pub standings: RenderedTable,
    /// Tags seen while staging.
    pub seen: RenderedTable,
    /// Recent laps, newest first.
    pub feed: Vec<LapEvent>,
    /// Whether the last poll reached the engine.
    pub online: bool,
}
