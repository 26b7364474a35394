use tokio::time::{Duration, Instant};

use crate::{
    dto::{
        snapshot::{RaceLimit, RaceSnapshot},
        view::{BannerView, ClockView, CueEvent, FullView, PendingView},
    },
    state::{
        clock::{self, ClockContext, ClockMode, ClockSample},
        laps::{LapDetector, LapEvent},
        race_machine::{
            Command, CommandPlan, PlanError, PlanId, RaceStateMachine, ResolveError,
            allowed_controls, allowed_flags,
        },
        standings::{RowPatch, RowReconciler, SEEN_COLUMNS, STANDINGS_COLUMNS, seen_tag_order},
    },
};

/// Sizing knobs for a display session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Countdown length assumed when the engine does not report one.
    pub countdown: Duration,
    /// Rows the standings table is padded to.
    pub viewport_rows: usize,
    /// Lap events kept in the feed.
    pub feed_capacity: usize,
}

/// Everything one snapshot changed, ready to be broadcast.
#[derive(Debug, Clone, Default)]
pub struct RenderPass {
    /// Clock repaint, when the display changed.
    pub clock: Option<ClockView>,
    /// Laps completed since the previous pass, newest first.
    pub laps: Vec<LapEvent>,
    /// Standings table patch.
    pub standings: RowPatch,
    /// Seen-tags table patch.
    pub seen: RowPatch,
    /// Present when the phase, flag or pending command changed.
    pub banner: Option<BannerView>,
    /// Phase and flag transitions for the audio cue side channel.
    pub cues: Vec<CueEvent>,
    /// Set when the connection came back with this snapshot.
    pub reconnected: bool,
    /// Set when lap memory was wiped by this pass.
    pub laps_cleared: bool,
}

/// Client-owned view state for one control-surface session.
///
/// Mutated only by snapshot application and the command pipeline, each of which
/// runs as one synchronous step.
#[derive(Debug)]
pub struct DisplaySession {
    settings: SessionSettings,
    machine: RaceStateMachine,
    clock_mode: ClockMode,
    clock_sample: ClockSample,
    limit: Option<RaceLimit>,
    standings: RowReconciler,
    seen: RowReconciler,
    laps: LapDetector,
    online: bool,
    last_clock: Option<ClockView>,
}

impl DisplaySession {
    /// Fresh session in staging with empty tables.
    pub fn new(settings: SessionSettings, clock_mode: ClockMode) -> Self {
        Self {
            settings,
            machine: RaceStateMachine::new(settings.countdown),
            clock_mode,
            clock_sample: ClockSample::default(),
            limit: None,
            standings: RowReconciler::new(&STANDINGS_COLUMNS, settings.viewport_rows),
            seen: RowReconciler::new(&SEEN_COLUMNS, settings.viewport_rows),
            laps: LapDetector::new(settings.feed_capacity),
            online: false,
            last_clock: None,
        }
    }

    /// Phase and flag state machine.
    pub fn machine(&self) -> &RaceStateMachine {
        &self.machine
    }

    /// Lap detector and feed.
    pub fn laps(&self) -> &LapDetector {
        &self.laps
    }

    /// Rendered standings table.
    pub fn standings(&self) -> &RowReconciler {
        &self.standings
    }

    /// Operator's preferred clock mode.
    pub fn clock_mode(&self) -> ClockMode {
        self.clock_mode
    }

    /// Whether the last poll succeeded.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Apply one snapshot: clock, laps, standings, then phase and flag.
    pub fn apply_snapshot(&mut self, snapshot: &RaceSnapshot, now: Instant) -> RenderPass {
        let mut pass = RenderPass {
            reconnected: !self.online,
            ..RenderPass::default()
        };
        self.online = true;

        self.clock_sample = ClockSample::from_snapshot(snapshot);
        if snapshot.limit.is_some() {
            self.limit = snapshot.limit;
        }
        pass.clock = self.refresh_clock(now);

        pass.laps = self.laps.observe(snapshot.phase, &snapshot.standings);

        pass.standings = self.standings.reconcile(&snapshot.standings);
        pass.seen = self
            .seen
            .reconcile_sorted(&snapshot.seen, seen_tag_order);

        let before = self.machine.snapshot();
        let change = self.machine.reconcile(
            snapshot.phase,
            snapshot.flag,
            self.clock_sample.countdown_remaining(),
            now,
        );
        if change.session_restarted {
            self.laps.clear();
            pass.laps_cleared = true;
        }
        if let Some((_, to)) = change.phase {
            pass.cues.push(CueEvent::phase(to));
        }
        if let Some((_, to)) = change.flag {
            pass.cues.push(CueEvent::flag(to));
        }
        if self.machine.snapshot() != before {
            pass.banner = Some(self.banner());
            // The anchor may have moved with the phase; keep the clock in step.
            if let Some(clock) = self.refresh_clock(now) {
                pass.clock = Some(clock);
            }
        }

        pass
    }

    /// Record a failed poll. Returns `true` on the online to offline edge.
    pub fn mark_offline(&mut self) -> bool {
        std::mem::replace(&mut self.online, false)
    }

    /// Validate and optimistically apply an operator command.
    ///
    /// Session transitions also wipe lap memory; the returned pass carries the
    /// optimistic repaint.
    pub fn plan_command(
        &mut self,
        command: Command,
        now: Instant,
    ) -> Result<(CommandPlan, RenderPass), PlanError> {
        let plan = self.machine.plan(command, now)?;

        let mut pass = RenderPass {
            banner: Some(self.banner()),
            ..RenderPass::default()
        };
        if command.is_session_transition() {
            self.laps.clear();
            pass.laps_cleared = true;
        }
        pass.clock = self.refresh_clock(now);

        Ok((plan, pass))
    }

    /// The engine accepted the pending command.
    pub fn confirm_command(
        &mut self,
        plan_id: PlanId,
        countdown: Option<Duration>,
        now: Instant,
    ) -> Result<RenderPass, ResolveError> {
        self.machine.confirm(plan_id, countdown, now)?;
        Ok(RenderPass {
            banner: Some(self.banner()),
            clock: self.refresh_clock(now),
            ..RenderPass::default()
        })
    }

    /// The engine refused the pending command; roll back to the last known-good
    /// signal.
    pub fn revert_command(
        &mut self,
        plan_id: PlanId,
        now: Instant,
    ) -> Result<RenderPass, ResolveError> {
        self.machine.revert(plan_id)?;
        Ok(RenderPass {
            banner: Some(self.banner()),
            clock: self.refresh_clock(now),
            ..RenderPass::default()
        })
    }

    /// Change the clock mode preference. Returns the new clock when it changed
    /// what is displayed.
    pub fn set_clock_mode(&mut self, mode: ClockMode, now: Instant) -> Option<ClockView> {
        self.clock_mode = mode;
        self.refresh_clock(now)
    }

    /// Re-derive the clock; `None` when the display did not change since the
    /// last call.
    pub fn refresh_clock(&mut self, now: Instant) -> Option<ClockView> {
        let view = self.clock_view(now);
        if self.last_clock.as_ref() == Some(&view) {
            return None;
        }
        self.last_clock = Some(view.clone());
        Some(view)
    }

    /// Whether the clock moves between polls.
    pub fn is_counting_down(&self) -> bool {
        self.machine.countdown_anchor().is_some()
    }

    /// Banner for the presented signal and pending command.
    pub fn banner(&self) -> BannerView {
        let snapshot = self.machine.snapshot();
        let phase = snapshot.signal.phase;
        BannerView {
            phase,
            flag: snapshot.signal.flag,
            pending: snapshot.pending.map(|(command, proposed)| PendingView {
                command: command.to_string(),
                phase: proposed.phase,
                flag: proposed.flag,
            }),
            allowed_flags: allowed_flags(phase).to_vec(),
            allowed_controls: allowed_controls(phase).to_vec(),
            version: snapshot.version,
        }
    }

    /// Complete view for clients joining mid-session.
    pub fn full_view(&self, now: Instant) -> FullView {
        FullView {
            clock: self.clock_view(now),
            banner: self.banner(),
            standings: self.standings.table(),
            seen: self.seen.table(),
            feed: self.laps.feed().cloned().collect(),
            online: self.online,
        }
    }

    fn clock_view(&self, now: Instant) -> ClockView {
        let reading = clock::derive(
            &self.clock_sample,
            &ClockContext {
                phase: self.machine.phase(),
                mode: self.clock_mode,
                anchor: self.machine.countdown_anchor(),
                countdown: self.machine.countdown_span(),
                now,
            },
        );
        ClockView {
            display: reading.display(),
            millis: reading.millis,
            source: reading.source,
            mode: reading.mode,
            mode_locked: reading.mode_locked,
            limit: self.limit.as_ref().map(clock::limit_summary),
        }
    }
}
