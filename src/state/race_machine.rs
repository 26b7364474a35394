use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{Duration, Instant};
use utoipa::ToSchema;
use uuid::Uuid;

/// Authoritative lifecycle stage of the race as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Before the start; entrants are being staged.
    Pre,
    /// Start countdown is running.
    Countdown,
    /// Race is running.
    Green,
    /// Leader is on the final lap.
    White,
    /// Race is finished.
    Checkered,
}

/// Condition signal shown to drivers, gated by the current [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    /// Staging flag shown before the start.
    Pre,
    /// Racing conditions.
    Green,
    /// Caution; hold position.
    Yellow,
    /// Session stopped.
    Red,
    /// Faster car approaching.
    Blue,
    /// Final lap.
    White,
    /// Race finished.
    Checkered,
}

/// Session-level control actions an operator can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    /// Enter pre-race staging (tag reads visible, laps not counted).
    StartPrep,
    /// Start the race, usually through a countdown.
    StartRace,
    /// Finish the race.
    EndRace,
    /// Abort the current session and go back to staging.
    AbortReset,
}

/// A command the operator asks the engine to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Show another flag.
    SetFlag(Flag),
    /// Change the session lifecycle.
    Control(ControlAction),
}

impl Phase {
    /// Every phase, in lifecycle order.
    pub const ALL: [Phase; 5] = [
        Phase::Pre,
        Phase::Countdown,
        Phase::Green,
        Phase::White,
        Phase::Checkered,
    ];

    /// Wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pre => "PRE",
            Phase::Countdown => "COUNTDOWN",
            Phase::Green => "GREEN",
            Phase::White => "WHITE",
            Phase::Checkered => "CHECKERED",
        }
    }

    /// Phases during which completed laps are counted.
    pub fn is_racing(self) -> bool {
        matches!(self, Phase::Green | Phase::White | Phase::Checkered)
    }
}

impl Flag {
    /// Every flag, in palette order.
    pub const ALL: [Flag; 7] = [
        Flag::Pre,
        Flag::Green,
        Flag::Yellow,
        Flag::Red,
        Flag::Blue,
        Flag::White,
        Flag::Checkered,
    ];

    /// Wire name of the flag.
    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Pre => "PRE",
            Flag::Green => "GREEN",
            Flag::Yellow => "YELLOW",
            Flag::Red => "RED",
            Flag::Blue => "BLUE",
            Flag::White => "WHITE",
            Flag::Checkered => "CHECKERED",
        }
    }
}

impl ControlAction {
    /// Path segment used for this action on the engine's command API.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::StartPrep => "start-prep",
            ControlAction::StartRace => "start-race",
            ControlAction::EndRace => "end-race",
            ControlAction::AbortReset => "abort-reset",
        }
    }
}

impl Command {
    /// Control actions start a new racing session (or leave one) and must wipe
    /// lap memory and the countdown anchor.
    pub fn is_session_transition(self) -> bool {
        matches!(self, Command::Control(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetFlag(flag) => write!(f, "set-flag {flag}"),
            Command::Control(action) => write!(f, "{action}"),
        }
    }
}

/// Error returned when a phase or flag name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownName {
    pub(crate) kind: &'static str,
    pub(crate) value: String,
}

impl FromStr for Phase {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownName {
                kind: "phase",
                value: s.to_string(),
            })
    }
}

impl FromStr for Flag {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Flag::ALL
            .into_iter()
            .find(|flag| flag.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownName {
                kind: "flag",
                value: s.to_string(),
            })
    }
}

/// Flags an operator may request while the race is in `phase`.
///
/// Single source of truth for both enabling controls and gating
/// [`RaceStateMachine::plan`]. `GREEN` is allowed from `PRE` so the operator can
/// arm the start from staging.
pub fn allowed_flags(phase: Phase) -> &'static [Flag] {
    match phase {
        Phase::Pre => &[Flag::Pre, Flag::Green],
        Phase::Countdown => &[Flag::Pre],
        Phase::Green | Phase::White => &[
            Flag::Green,
            Flag::Yellow,
            Flag::Red,
            Flag::Blue,
            Flag::White,
            Flag::Checkered,
        ],
        Phase::Checkered => &[Flag::Checkered],
    }
}

/// Control actions available while the race is in `phase`.
pub fn allowed_controls(phase: Phase) -> &'static [ControlAction] {
    match phase {
        Phase::Pre => &[
            ControlAction::StartPrep,
            ControlAction::StartRace,
            ControlAction::AbortReset,
        ],
        Phase::Countdown => &[ControlAction::AbortReset],
        Phase::Green | Phase::White => &[ControlAction::EndRace, ControlAction::AbortReset],
        Phase::Checkered => &[ControlAction::StartPrep, ControlAction::AbortReset],
    }
}

/// Whether `command` may be issued while the race is in `phase`.
pub fn is_allowed(phase: Phase, command: Command) -> bool {
    match command {
        Command::SetFlag(flag) => allowed_flags(phase).contains(&flag),
        Command::Control(action) => allowed_controls(phase).contains(&action),
    }
}

/// The phase/flag pair the banner presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RaceSignal {
    /// Lifecycle stage.
    pub phase: Phase,
    /// Flag shown to drivers.
    pub flag: Flag,
}

/// Error returned when a command is not legal in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{command} is not allowed while the race is {phase}")]
pub struct IllegalCommand {
    /// The phase the machine was in when the command was requested.
    pub phase: Phase,
    /// The refused command.
    pub command: Command,
}

/// Errors that can occur when planning an optimistic command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Another command is still waiting for the engine.
    #[error("another command is still pending")]
    AlreadyPending,
    /// The command is not legal in the current phase.
    #[error(transparent)]
    Illegal(#[from] IllegalCommand),
}

/// Errors that can occur when confirming or reverting a pending command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No command is pending.
    #[error("no command is pending")]
    NoPending,
    /// The plan id does not match the pending command.
    #[error("pending command {expected} does not match {got}")]
    IdMismatch {
        /// Id of the pending command.
        expected: PlanId,
        /// Id that was provided.
        got: PlanId,
    },
}

/// Unique identifier for an optimistic command.
pub type PlanId = Uuid;

/// An optimistically applied command awaiting the engine's answer.
#[derive(Debug, Clone)]
pub struct CommandPlan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Command being carried out.
    pub command: Command,
    /// Last known-good signal, restored on revert.
    pub prior: RaceSignal,
    /// Signal presented while the command is in flight.
    pub proposed: RaceSignal,
    /// Countdown anchor in place before the command, restored on revert.
    prior_anchor: Option<Instant>,
    /// Length the prior anchor was set from.
    prior_span: Duration,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the machine for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    /// Presented phase and flag.
    pub signal: RaceSignal,
    /// Bumped on every presented change.
    pub version: usize,
    /// Command in flight and the signal it proposed.
    pub pending: Option<(Command, RaceSignal)>,
}

/// What changed when an engine snapshot was reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Phase transition observed, as `(from, to)`.
    pub phase: Option<(Phase, Phase)>,
    /// Flag transition observed, as `(from, to)`.
    pub flag: Option<(Flag, Flag)>,
    /// The engine moved back to staging on its own (restart from another console).
    pub session_restarted: bool,
}

impl Reconciliation {
    /// Whether the presented signal changed.
    pub fn changed(&self) -> bool {
        self.phase.is_some() || self.flag.is_some()
    }
}

/// How far a local countdown anchor may drift from an authoritative value before
/// it is corrected.
pub const ANCHOR_DRIFT_TOLERANCE: Duration = Duration::from_millis(500);

/// Client-side phase and flag state machine with optimistic commands.
#[derive(Debug, Clone)]
pub struct RaceStateMachine {
    signal: RaceSignal,
    version: usize,
    pending: Option<CommandPlan>,
    countdown_anchor: Option<Instant>,
    /// Countdown length the current anchor was set from.
    anchor_span: Duration,
    countdown: Duration,
}

impl RaceStateMachine {
    /// Create a machine in staging with the configured countdown length.
    pub fn new(countdown: Duration) -> Self {
        Self {
            signal: RaceSignal {
                phase: Phase::Pre,
                flag: Flag::Pre,
            },
            version: 0,
            pending: None,
            countdown_anchor: None,
            anchor_span: countdown,
            countdown,
        }
    }

    /// Current presented phase.
    pub fn phase(&self) -> Phase {
        self.signal.phase
    }

    /// Current presented flag.
    pub fn flag(&self) -> Flag {
        self.signal.flag
    }

    /// Current presented phase and flag.
    pub fn signal(&self) -> RaceSignal {
        self.signal
    }

    /// Pending optimistic command, if any.
    pub fn pending(&self) -> Option<&CommandPlan> {
        self.pending.as_ref()
    }

    /// Instant the countdown reaches zero; present only during `COUNTDOWN`.
    pub fn countdown_anchor(&self) -> Option<Instant> {
        self.countdown_anchor
    }

    /// Configured countdown length.
    pub fn countdown(&self) -> Duration {
        self.countdown
    }

    /// Length of the countdown being shown: the duration the engine reported
    /// when the anchor was set, otherwise the configured length.
    pub fn countdown_span(&self) -> Duration {
        if self.countdown_anchor.is_some() {
            self.anchor_span
        } else {
            self.countdown
        }
    }

    /// Create a snapshot of the machine.
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            signal: self.signal,
            version: self.version,
            pending: self
                .pending
                .as_ref()
                .map(|plan| (plan.command, plan.proposed)),
        }
    }

    /// Validate `command` against the legality table and apply it optimistically.
    ///
    /// Refused commands leave the machine untouched. Session transitions clear
    /// the countdown anchor before the optimistic phase is entered.
    pub fn plan(&mut self, command: Command, now: Instant) -> Result<CommandPlan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        if !is_allowed(self.signal.phase, command) {
            return Err(IllegalCommand {
                phase: self.signal.phase,
                command,
            }
            .into());
        }

        let plan = CommandPlan {
            id: Uuid::new_v4(),
            command,
            prior: self.signal,
            proposed: self.optimistic_signal(command),
            prior_anchor: self.countdown_anchor,
            prior_span: self.anchor_span,
            pending_since: now,
        };

        if command.is_session_transition() {
            self.countdown_anchor = None;
        }
        self.enter(plan.proposed, None, now);
        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// The engine accepted the command. The presented signal stays as is until
    /// the next snapshot; a countdown length carried by the answer is used as an
    /// authoritative anchor.
    pub fn confirm(
        &mut self,
        plan_id: PlanId,
        countdown: Option<Duration>,
        now: Instant,
    ) -> Result<(), ResolveError> {
        self.take_pending(plan_id)?;

        if self.signal.phase == Phase::Countdown
            && let Some(remaining) = countdown
        {
            self.set_anchor(remaining, now);
        }

        Ok(())
    }

    /// The engine refused the command or could not be reached: restore the last
    /// known-good signal and anchor.
    pub fn revert(&mut self, plan_id: PlanId) -> Result<RaceSignal, ResolveError> {
        let plan = self.take_pending(plan_id)?;

        if self.signal != plan.prior {
            self.version += 1;
        }
        self.signal = plan.prior;
        self.countdown_anchor = if plan.prior.phase == Phase::Countdown {
            plan.prior_anchor
        } else {
            None
        };
        self.anchor_span = plan.prior_span;

        Ok(self.signal)
    }

    /// Adopt the authoritative phase and flag from a snapshot.
    ///
    /// Unknown values keep the current ones. A pending command keeps its
    /// rollback target in step with the newest authoritative signal.
    /// `countdown_hint` is an explicit remaining countdown reported by the
    /// engine.
    pub fn reconcile(
        &mut self,
        phase: Option<Phase>,
        flag: Option<Flag>,
        countdown_hint: Option<Duration>,
        now: Instant,
    ) -> Reconciliation {
        let before = self.signal;
        let next = RaceSignal {
            phase: phase.unwrap_or(before.phase),
            flag: flag.unwrap_or(before.flag),
        };

        self.enter(next, countdown_hint, now);

        if let Some(plan) = self.pending.as_mut() {
            plan.prior = next;
            plan.prior_anchor = self.countdown_anchor;
            plan.prior_span = self.anchor_span;
        }

        Reconciliation {
            phase: (before.phase != next.phase).then_some((before.phase, next.phase)),
            flag: (before.flag != next.flag).then_some((before.flag, next.flag)),
            session_restarted: before.phase != Phase::Pre && next.phase == Phase::Pre,
        }
    }

    fn take_pending(&mut self, plan_id: PlanId) -> Result<CommandPlan, ResolveError> {
        let plan = self.pending.take().ok_or(ResolveError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ResolveError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        Ok(plan)
    }

    /// Move to `next`, keeping the anchor present exactly while in `COUNTDOWN`.
    fn enter(&mut self, next: RaceSignal, countdown_hint: Option<Duration>, now: Instant) {
        if next != self.signal {
            self.version += 1;
        }
        self.signal = next;

        if next.phase != Phase::Countdown {
            self.countdown_anchor = None;
            return;
        }

        match (self.countdown_anchor, countdown_hint) {
            (None, hint) => self.set_anchor(hint.unwrap_or(self.countdown), now),
            (Some(anchor), Some(remaining)) => {
                let reported = now + remaining;
                let drift = if reported > anchor {
                    reported - anchor
                } else {
                    anchor - reported
                };
                if drift > ANCHOR_DRIFT_TOLERANCE {
                    self.set_anchor(remaining, now);
                }
            }
            (Some(_), None) => {}
        }
    }

    fn set_anchor(&mut self, remaining: Duration, now: Instant) {
        self.countdown_anchor = Some(now + remaining);
        self.anchor_span = remaining;
    }

    fn optimistic_signal(&self, command: Command) -> RaceSignal {
        match command {
            Command::SetFlag(flag) => RaceSignal {
                phase: self.signal.phase,
                flag,
            },
            Command::Control(ControlAction::StartPrep | ControlAction::AbortReset) => RaceSignal {
                phase: Phase::Pre,
                flag: Flag::Pre,
            },
            Command::Control(ControlAction::StartRace) if self.countdown.is_zero() => RaceSignal {
                phase: Phase::Green,
                flag: Flag::Green,
            },
            Command::Control(ControlAction::StartRace) => RaceSignal {
                phase: Phase::Countdown,
                flag: Flag::Pre,
            },
            Command::Control(ControlAction::EndRace) => RaceSignal {
                phase: Phase::Checkered,
                flag: Flag::Checkered,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTDOWN: Duration = Duration::from_secs(10);

    fn machine_in(phase: Phase, flag: Flag) -> RaceStateMachine {
        let mut sm = RaceStateMachine::new(COUNTDOWN);
        sm.reconcile(Some(phase), Some(flag), None, Instant::now());
        sm
    }

    #[test]
    fn initial_state_is_pre() {
        let sm = RaceStateMachine::new(COUNTDOWN);
        assert_eq!(sm.phase(), Phase::Pre);
        assert_eq!(sm.flag(), Flag::Pre);
        assert!(sm.pending().is_none());
        assert!(sm.countdown_anchor().is_none());
    }

    #[test]
    fn legality_table_is_total() {
        for phase in Phase::ALL {
            assert!(!allowed_flags(phase).is_empty(), "no flags for {phase}");
            assert!(
                allowed_controls(phase).contains(&ControlAction::AbortReset),
                "abort must always be possible ({phase})"
            );
        }
        assert_eq!(allowed_flags(Phase::Pre), &[Flag::Pre, Flag::Green]);
        assert_eq!(allowed_flags(Phase::Checkered), &[Flag::Checkered]);
    }

    #[test]
    fn illegal_flag_is_refused_without_side_effects() {
        let mut sm = RaceStateMachine::new(COUNTDOWN);
        let version = sm.snapshot().version;

        let err = sm
            .plan(Command::SetFlag(Flag::Red), Instant::now())
            .unwrap_err();

        assert_eq!(
            err,
            PlanError::Illegal(IllegalCommand {
                phase: Phase::Pre,
                command: Command::SetFlag(Flag::Red),
            })
        );
        assert_eq!(sm.flag(), Flag::Pre);
        assert!(sm.pending().is_none());
        assert_eq!(sm.snapshot().version, version);
    }

    #[test]
    fn optimistic_flag_then_rollback() {
        let mut sm = RaceStateMachine::new(COUNTDOWN);

        let plan = sm
            .plan(Command::SetFlag(Flag::Green), Instant::now())
            .unwrap();
        assert_eq!(sm.flag(), Flag::Green);
        assert_eq!(plan.prior.flag, Flag::Pre);

        let restored = sm.revert(plan.id).unwrap();
        assert_eq!(restored.flag, Flag::Pre);
        assert_eq!(sm.flag(), Flag::Pre);
        assert!(sm.pending().is_none());
    }

    #[test]
    fn only_one_command_may_be_pending() {
        let mut sm = machine_in(Phase::Green, Flag::Green);
        let plan = sm
            .plan(Command::SetFlag(Flag::Yellow), Instant::now())
            .unwrap();

        let err = sm
            .plan(Command::SetFlag(Flag::Red), Instant::now())
            .unwrap_err();
        assert_eq!(err, PlanError::AlreadyPending);
        assert_eq!(sm.flag(), Flag::Yellow);

        sm.confirm(plan.id, None, Instant::now()).unwrap();
        assert!(sm.plan(Command::SetFlag(Flag::Red), Instant::now()).is_ok());
    }

    #[test]
    fn resolve_with_wrong_id_keeps_pending() {
        let mut sm = machine_in(Phase::Green, Flag::Green);
        let plan = sm
            .plan(Command::SetFlag(Flag::Yellow), Instant::now())
            .unwrap();

        let other = Uuid::new_v4();
        assert_eq!(
            sm.revert(other).unwrap_err(),
            ResolveError::IdMismatch {
                expected: plan.id,
                got: other,
            }
        );
        assert!(sm.pending().is_some());
        assert_eq!(sm.confirm(plan.id, None, Instant::now()), Ok(()));
        assert_eq!(
            sm.confirm(plan.id, None, Instant::now()),
            Err(ResolveError::NoPending)
        );
    }

    #[test]
    fn snapshot_during_pending_moves_rollback_target() {
        let mut sm = machine_in(Phase::Green, Flag::Green);
        let plan = sm
            .plan(Command::SetFlag(Flag::Red), Instant::now())
            .unwrap();

        let change = sm.reconcile(Some(Phase::Green), Some(Flag::Yellow), None, Instant::now());
        assert_eq!(change.flag, Some((Flag::Red, Flag::Yellow)));
        assert_eq!(sm.flag(), Flag::Yellow);

        let restored = sm.revert(plan.id).unwrap();
        assert_eq!(restored.flag, Flag::Yellow);
    }

    #[test]
    fn unknown_snapshot_fields_keep_current_signal() {
        let mut sm = machine_in(Phase::White, Flag::Blue);
        let change = sm.reconcile(None, None, None, Instant::now());
        assert!(!change.changed());
        assert_eq!(sm.signal(), RaceSignal {
            phase: Phase::White,
            flag: Flag::Blue,
        });
    }

    #[test]
    fn anchor_exists_only_during_countdown() {
        let now = Instant::now();
        let mut sm = RaceStateMachine::new(COUNTDOWN);

        sm.reconcile(Some(Phase::Countdown), Some(Flag::Pre), None, now);
        assert_eq!(sm.countdown_anchor(), Some(now + COUNTDOWN));

        sm.reconcile(Some(Phase::Green), Some(Flag::Green), None, now);
        assert!(sm.countdown_anchor().is_none());
    }

    #[test]
    fn anchor_is_not_rewritten_on_every_poll() {
        let start = Instant::now();
        let mut sm = RaceStateMachine::new(COUNTDOWN);
        sm.reconcile(
            Some(Phase::Countdown),
            None,
            Some(Duration::from_secs(8)),
            start,
        );
        let anchor = sm.countdown_anchor().unwrap();

        // A report within tolerance leaves the anchor alone.
        let later = start + Duration::from_secs(1);
        sm.reconcile(
            Some(Phase::Countdown),
            None,
            Some(Duration::from_millis(6_800)),
            later,
        );
        assert_eq!(sm.countdown_anchor(), Some(anchor));

        // No report at all keeps it as well.
        sm.reconcile(Some(Phase::Countdown), None, None, later);
        assert_eq!(sm.countdown_anchor(), Some(anchor));

        // A report that disagrees by more than the tolerance corrects it.
        sm.reconcile(
            Some(Phase::Countdown),
            None,
            Some(Duration::from_secs(3)),
            later,
        );
        assert_eq!(sm.countdown_anchor(), Some(later + Duration::from_secs(3)));
    }

    #[test]
    fn start_race_enters_countdown_with_fresh_anchor() {
        let now = Instant::now();
        let mut sm = RaceStateMachine::new(COUNTDOWN);

        let plan = sm
            .plan(Command::Control(ControlAction::StartRace), now)
            .unwrap();
        assert_eq!(plan.proposed.phase, Phase::Countdown);
        assert_eq!(sm.countdown_anchor(), Some(now + COUNTDOWN));

        let later = now + Duration::from_millis(200);
        sm.confirm(plan.id, Some(Duration::from_secs(5)), later)
            .unwrap();
        assert_eq!(sm.countdown_anchor(), Some(later + Duration::from_secs(5)));
    }

    #[test]
    fn reported_countdown_length_outranks_configuration() {
        let now = Instant::now();
        let mut sm = RaceStateMachine::new(COUNTDOWN);
        assert_eq!(sm.countdown_span(), COUNTDOWN);

        sm.reconcile(
            Some(Phase::Countdown),
            None,
            Some(Duration::from_secs(30)),
            now,
        );
        assert_eq!(sm.countdown_span(), Duration::from_secs(30));

        sm.reconcile(Some(Phase::Green), Some(Flag::Green), None, now);
        assert_eq!(sm.countdown_span(), COUNTDOWN);
    }

    #[test]
    fn start_race_without_countdown_goes_green() {
        let mut sm = RaceStateMachine::new(Duration::ZERO);
        let plan = sm
            .plan(Command::Control(ControlAction::StartRace), Instant::now())
            .unwrap();
        assert_eq!(plan.proposed, RaceSignal {
            phase: Phase::Green,
            flag: Flag::Green,
        });
        assert!(sm.countdown_anchor().is_none());
    }

    #[test]
    fn failed_abort_restores_countdown_anchor() {
        let now = Instant::now();
        let mut sm = RaceStateMachine::new(COUNTDOWN);
        sm.reconcile(Some(Phase::Countdown), Some(Flag::Pre), None, now);
        let anchor = sm.countdown_anchor();

        let plan = sm
            .plan(Command::Control(ControlAction::AbortReset), now)
            .unwrap();
        assert_eq!(sm.phase(), Phase::Pre);
        assert!(sm.countdown_anchor().is_none());

        sm.revert(plan.id).unwrap();
        assert_eq!(sm.phase(), Phase::Countdown);
        assert_eq!(sm.countdown_anchor(), anchor);
    }

    #[test]
    fn control_actions_are_gated_by_phase() {
        let mut sm = machine_in(Phase::Green, Flag::Green);
        let err = sm
            .plan(Command::Control(ControlAction::StartRace), Instant::now())
            .unwrap_err();
        assert!(matches!(err, PlanError::Illegal(_)));
        assert!(
            sm.plan(Command::Control(ControlAction::EndRace), Instant::now())
                .is_ok()
        );
    }

    #[test]
    fn restart_by_engine_is_reported() {
        let mut sm = machine_in(Phase::Checkered, Flag::Checkered);
        let change = sm.reconcile(Some(Phase::Pre), Some(Flag::Pre), None, Instant::now());
        assert!(change.session_restarted);
        assert_eq!(change.phase, Some((Phase::Checkered, Phase::Pre)));
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("green".parse::<Phase>(), Ok(Phase::Green));
        assert_eq!(" Checkered ".parse::<Flag>(), Ok(Flag::Checkered));
        assert!("purple".parse::<Flag>().is_err());
    }
}
