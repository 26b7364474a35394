//! Canonical clock derivation.
//!
//! The engine reports the race clock in several shapes (a signed millisecond
//! value, an elapsed/remaining pair, or a countdown in seconds). This module is
//! the only place that looks at those raw fields; everything else works with
//! the signed [`ClockReading`] it produces.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use utoipa::ToSchema;

use crate::{
    dto::snapshot::{RaceLimit, RaceSnapshot},
    state::race_machine::{Phase, UnknownName},
};

/// Which duration the operator wants to see while the race runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Time left in the session.
    #[default]
    Remaining,
    /// Time since the start.
    Elapsed,
}

impl ClockMode {
    /// Stored and wire name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            ClockMode::Remaining => "remaining",
            ClockMode::Elapsed => "elapsed",
        }
    }
}

impl FromStr for ClockMode {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remaining" => Ok(ClockMode::Remaining),
            "elapsed" => Ok(ClockMode::Elapsed),
            _ => Err(UnknownName {
                kind: "clock mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Which rule produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Engine-provided signed milliseconds.
    Canonical,
    /// Engine-provided remaining seconds.
    Remaining,
    /// Engine-provided elapsed seconds.
    Elapsed,
    /// Local extrapolation from the countdown anchor.
    Anchor,
    /// Engine-provided countdown seconds, before an anchor exists.
    Countdown,
    /// Nothing usable was reported.
    Fallback,
}

/// Raw clock fields lifted from one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockSample {
    canonical_ms: Option<i64>,
    elapsed_s: Option<f64>,
    remaining_s: Option<f64>,
    countdown_s: Option<f64>,
}

impl ClockSample {
    /// Lift the clock fields out of `snapshot`, dropping non-finite values.
    pub fn from_snapshot(snapshot: &RaceSnapshot) -> Self {
        Self {
            canonical_ms: snapshot.clock_ms,
            elapsed_s: finite(snapshot.elapsed_s),
            remaining_s: finite(snapshot.remaining_s),
            countdown_s: finite(snapshot.countdown_remaining_s),
        }
    }

    /// Whether the engine reported a remaining duration.
    pub fn has_remaining(&self) -> bool {
        self.remaining_s.is_some()
    }

    /// Explicit countdown remaining reported by the engine, if any.
    ///
    /// A negative canonical value is a countdown by definition.
    pub fn countdown_remaining(&self) -> Option<Duration> {
        match (self.canonical_ms, self.countdown_s) {
            (Some(ms), _) if ms < 0 => Some(Duration::from_millis(ms.unsigned_abs())),
            (_, Some(seconds)) if seconds >= 0.0 => Some(Duration::from_secs_f64(seconds)),
            _ => None,
        }
    }
}

/// Everything the deriver needs besides the sample.
#[derive(Debug, Clone, Copy)]
pub struct ClockContext {
    /// Presented phase.
    pub phase: Phase,
    /// Operator's preferred mode.
    pub mode: ClockMode,
    /// Instant the countdown reaches zero, while counting down.
    pub anchor: Option<Instant>,
    /// Length of the running countdown; floors the extrapolation.
    pub countdown: Duration,
    /// Time of the reading.
    pub now: Instant,
}

/// One canonical clock value plus the mode toggle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    /// Signed milliseconds; negative while counting down.
    pub millis: i64,
    /// Rule that produced the value.
    pub source: ClockSource,
    /// Mode actually used for the reading.
    pub mode: ClockMode,
    /// Set when only one mode is meaningful and the toggle must be disabled.
    pub mode_locked: bool,
}

impl ClockReading {
    /// Formatted `HH:MM:SS` text.
    pub fn display(&self) -> String {
        format_signed_hms(self.millis)
    }
}

/// Derive the display clock, in order of precedence:
///
/// 1. the engine's canonical signed milliseconds, as-is;
/// 2. the elapsed/remaining pair, per `mode` (elapsed when remaining is absent);
/// 3. while counting down, the local anchor (clamped to the countdown length),
///    then the engine's countdown seconds;
/// 4. `-countdown` while counting down, otherwise zero.
pub fn derive(sample: &ClockSample, ctx: &ClockContext) -> ClockReading {
    let mode_locked = !sample.has_remaining() || ctx.phase == Phase::Countdown;
    let mode = if mode_locked {
        ClockMode::Elapsed
    } else {
        ctx.mode
    };

    let (millis, source) = select(sample, ctx, mode);

    ClockReading {
        millis,
        source,
        mode,
        mode_locked,
    }
}

fn select(sample: &ClockSample, ctx: &ClockContext, mode: ClockMode) -> (i64, ClockSource) {
    if let Some(ms) = sample.canonical_ms {
        return (ms, ClockSource::Canonical);
    }

    match (sample.elapsed_s, sample.remaining_s, mode) {
        (_, Some(remaining), ClockMode::Remaining) | (None, Some(remaining), _) => {
            return (seconds_to_millis(remaining), ClockSource::Remaining);
        }
        (Some(elapsed), _, _) => return (seconds_to_millis(elapsed), ClockSource::Elapsed),
        (None, None, _) => {}
    }

    if ctx.phase != Phase::Countdown {
        return (0, ClockSource::Fallback);
    }

    let floor = -duration_millis(ctx.countdown);
    if let Some(anchor) = ctx.anchor {
        let left = duration_millis(anchor.saturating_duration_since(ctx.now));
        return ((-left).max(floor), ClockSource::Anchor);
    }

    if let Some(seconds) = sample.countdown_s {
        return (-seconds_to_millis(seconds.max(0.0)), ClockSource::Countdown);
    }

    (floor, ClockSource::Fallback)
}

/// Format signed milliseconds as `HH:MM:SS` of the floored absolute seconds,
/// prefixed with `-` when negative.
pub fn format_signed_hms(millis: i64) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let total = millis.unsigned_abs() / 1_000;
    let (hours, minutes, seconds) = (total / 3_600, (total / 60) % 60, total % 60);
    format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
}

/// Short human summary of the session cap.
pub fn limit_summary(limit: &RaceLimit) -> String {
    match limit {
        RaceLimit::Time(seconds) => {
            let total = seconds.max(0.0) as u64;
            let (hours, minutes, secs) = (total / 3_600, (total / 60) % 60, total % 60);
            if hours > 0 {
                format!("{hours}:{minutes:02}:{secs:02} time limit")
            } else {
                format!("{minutes}:{secs:02} time limit")
            }
        }
        RaceLimit::Laps(1) => "1 lap".to_string(),
        RaceLimit::Laps(laps) => format!("{laps} laps"),
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1_000.0).floor() as i64
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
