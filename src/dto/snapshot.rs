//! Wire representation of the race-state snapshot polled from the race engine.
//!
//! Decoding is lenient: a missing or malformed field becomes "unknown" (`None` or
//! empty) instead of failing the whole snapshot, so a partial payload still
//! refreshes whatever it does carry.

use serde::Deserialize;
use serde_with::{DefaultOnError, DisplayFromStr, FromInto, VecSkipError, serde_as};

use crate::state::race_machine::{Flag, Phase};

/// One immutable race-state payload received per poll.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RaceSnapshot {
    /// Identifier of the race the engine answered for.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub race_id: Option<String>,
    /// Lifecycle stage; `None` when missing or unknown.
    #[serde_as(as = "DefaultOnError<Option<DisplayFromStr>>")]
    pub phase: Option<Phase>,
    /// Displayed flag; `None` when missing or unknown.
    #[serde_as(as = "DefaultOnError<Option<DisplayFromStr>>")]
    pub flag: Option<Flag>,
    /// Canonical signed clock in milliseconds; negative while counting down.
    #[serde_as(as = "DefaultOnError")]
    pub clock_ms: Option<i64>,
    /// Seconds since the start.
    #[serde_as(as = "DefaultOnError")]
    pub elapsed_s: Option<f64>,
    /// Seconds left in a timed session.
    #[serde_as(as = "DefaultOnError")]
    pub remaining_s: Option<f64>,
    /// Seconds left before the start while in `COUNTDOWN`.
    #[serde_as(as = "DefaultOnError")]
    pub countdown_remaining_s: Option<f64>,
    /// Session cap, when the engine reports one.
    #[serde_as(as = "DefaultOnError")]
    pub limit: Option<RaceLimit>,
    /// Ranked standings, leader first.
    #[serde_as(as = "DefaultOnError<VecSkipError<_>>")]
    pub standings: Vec<EntrantRow>,
    /// Tag reads collected during staging.
    #[serde_as(as = "DefaultOnError<VecSkipError<_>>")]
    pub seen: Vec<SeenTagRow>,
}

/// Session cap, used for display summaries only.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RaceLimit {
    /// Timed session, in seconds.
    Time(f64),
    /// Fixed number of laps.
    Laps(u32),
}

/// One ranked entrant inside the standings.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EntrantRow {
    /// Stable engine id of the entrant.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub entrant_id: Option<String>,
    /// Race number.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub number: Option<String>,
    /// Display name.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub name: Option<String>,
    /// Completed laps; never negative.
    #[serde_as(as = "DefaultOnError")]
    pub laps: Option<u32>,
    /// Last lap time, preformatted.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub last_time: Option<String>,
    /// Best lap time, preformatted.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub best_time: Option<String>,
    /// Rank in the standings.
    #[serde_as(as = "DefaultOnError")]
    pub position: Option<u32>,
    /// Laps behind the leader.
    #[serde_as(as = "DefaultOnError")]
    pub lap_deficit: Option<u32>,
    /// Whether the entrant takes part.
    #[serde_as(as = "DefaultOnError")]
    pub enabled: Option<bool>,
}

/// One tag seen by the readers while staging.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeenTagRow {
    /// Entrant the tag belongs to, when registered.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub entrant_id: Option<String>,
    /// Transponder tag id.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub tag: Option<String>,
    /// Race number.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub number: Option<String>,
    /// Display name.
    #[serde_as(as = "DefaultOnError<Option<FromInto<Scalar>>>")]
    pub name: Option<String>,
    /// How many times the tag was read.
    #[serde_as(as = "DefaultOnError")]
    pub reads: Option<u32>,
    /// Whether the tag is enabled.
    #[serde_as(as = "DefaultOnError")]
    pub enabled: Option<bool>,
}

impl EntrantRow {
    /// Rows without an explicit flag are treated as enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

impl SeenTagRow {
    /// Rows without an explicit flag are treated as enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Any JSON scalar, used where the engine may send either text or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(text) => text,
            Scalar::Integer(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Bool(value) => value.to_string(),
        }
    }
}
