use std::{
    collections::{HashMap, VecDeque},
    time::SystemTime,
};

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::{
    dto::{format_system_time, snapshot::EntrantRow},
    state::{
        race_machine::Phase,
        standings::{RowKey, TableRow},
    },
};

/// Default number of lap events kept in the feed.
pub const DEFAULT_FEED_CAPACITY: usize = 25;

/// A lap completed by one entrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LapEvent {
    /// Row the lap was counted for.
    pub key: RowKey,
    /// Engine id of the entrant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrant_id: Option<String>,
    /// Race number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Lap count after the completed lap.
    pub laps: u32,
    /// Time of the completed lap, as reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_time: Option<String>,
    /// Best lap so far, as reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_time: Option<String>,
    /// RFC 3339 time the lap was noticed.
    pub seen_at: String,
}

/// Detects lap increments between consecutive snapshots.
///
/// The first sighting of an entrant only records a baseline. Baselines are
/// frozen outside racing phases and are only cleared through [`clear`], which
/// session transitions call; a lap count going down is ignored here.
///
/// [`clear`]: LapDetector::clear
#[derive(Debug, Clone)]
pub struct LapDetector {
    baselines: HashMap<RowKey, u32>,
    feed: VecDeque<LapEvent>,
    capacity: usize,
}

impl LapDetector {
    /// Empty detector keeping at most `capacity` feed events.
    pub fn new(capacity: usize) -> Self {
        Self {
            baselines: HashMap::new(),
            feed: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Compare `rows` to the baselines and return the laps completed since the
    /// previous snapshot, newest first.
    pub fn observe(&mut self, phase: Option<Phase>, rows: &[EntrantRow]) -> Vec<LapEvent> {
        if !phase.is_some_and(Phase::is_racing) {
            return Vec::new();
        }

        let mut events = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let Some(laps) = row.laps else {
                continue;
            };
            let key = row.key(index);

            match self.baselines.get(&key).copied() {
                None => {
                    self.baselines.insert(key, laps);
                }
                Some(previous) if laps > previous => {
                    self.baselines.insert(key.clone(), laps);
                    events.push(LapEvent {
                        key,
                        entrant_id: row.entrant_id.clone(),
                        number: row.number.clone(),
                        name: row.name.clone(),
                        laps,
                        last_time: row.last_time.clone(),
                        best_time: row.best_time.clone(),
                        seen_at: format_system_time(SystemTime::now()),
                    });
                }
                Some(previous) if laps < previous => {
                    debug!(%key, previous, laps, "lap count went down; waiting for a session reset");
                }
                Some(_) => {}
            }
        }

        events.reverse();
        for event in events.iter().rev() {
            self.feed.push_front(event.clone());
        }
        self.feed.truncate(self.capacity);

        events
    }

    /// Forget every baseline and the feed.
    pub fn clear(&mut self) {
        self.baselines.clear();
        self.feed.clear();
    }

    /// Recent events, newest first.
    pub fn feed(&self) -> impl Iterator<Item = &LapEvent> {
        self.feed.iter()
    }

    /// Last lap count recorded for `key`.
    pub fn baseline(&self, key: &RowKey) -> Option<u32> {
        self.baselines.get(key).copied()
    }

    /// Whether no baseline is recorded.
    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}

impl Default for LapDetector {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, laps: u32) -> EntrantRow {
        EntrantRow {
            entrant_id: Some(id.to_string()),
            number: Some(id.to_string()),
            laps: Some(laps),
            ..Default::default()
        }
    }

    #[test]
    fn first_sighting_only_records_baseline() {
        let mut detector = LapDetector::default();
        let events = detector.observe(Some(Phase::Green), &[row("1", 3), row("2", 0)]);
        assert!(events.is_empty());
        assert_eq!(detector.baseline(&RowKey::entrant("1")), Some(3));
    }

    #[test]
    fn jump_of_two_laps_is_one_event() {
        let mut detector = LapDetector::default();
        detector.observe(Some(Phase::Green), &[row("1", 3)]);

        let events = detector.observe(Some(Phase::Green), &[row("1", 5)]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].laps, 5);
        assert_eq!(detector.feed().count(), 1);
    }

    #[test]
    fn unchanged_snapshot_emits_nothing() {
        let rows = [row("1", 3), row("2", 4)];
        let mut detector = LapDetector::default();
        detector.observe(Some(Phase::Green), &rows);
        detector.observe(Some(Phase::Green), &[row("1", 4), row("2", 4)]);

        assert!(detector.observe(Some(Phase::Green), &[row("1", 4), row("2", 4)]).is_empty());
        assert_eq!(detector.feed().count(), 1);
    }

    #[test]
    fn decrease_is_ignored_until_cleared() {
        let mut detector = LapDetector::default();
        detector.observe(Some(Phase::Green), &[row("1", 6)]);

        assert!(detector.observe(Some(Phase::Green), &[row("1", 0)]).is_empty());
        assert_eq!(detector.baseline(&RowKey::entrant("1")), Some(6));

        detector.clear();
        assert!(detector.observe(Some(Phase::Green), &[row("1", 0)]).is_empty());
        assert_eq!(detector.baseline(&RowKey::entrant("1")), Some(0));
    }

    #[test]
    fn frozen_outside_racing_phases() {
        let mut detector = LapDetector::default();
        detector.observe(Some(Phase::Green), &[row("1", 1)]);

        assert!(detector.observe(Some(Phase::Pre), &[row("1", 2)]).is_empty());
        assert!(detector.observe(None, &[row("1", 2)]).is_empty());
        assert_eq!(detector.baseline(&RowKey::entrant("1")), Some(1));

        let events = detector.observe(Some(Phase::White), &[row("1", 2)]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn feed_is_bounded_and_newest_first() {
        let mut detector = LapDetector::new(3);
        detector.observe(Some(Phase::Green), &[row("1", 0), row("2", 0)]);

        for lap in 1..=3 {
            detector.observe(Some(Phase::Green), &[row("1", lap), row("2", lap)]);
        }

        let feed: Vec<_> = detector
            .feed()
            .map(|e| (e.entrant_id.clone().unwrap(), e.laps))
            .collect();
        assert_eq!(
            feed,
            vec![("2".into(), 3), ("1".into(), 3), ("2".into(), 2)]
        );
    }
}
