//! Operation state machine
//!
//! Transitions are pure: they take a session by value and hand back the updated session plus
//! the side effect of the stage that was entered. Running the side effect is the caller's job,
//! which keeps "fires once per stage entry" a property of this module alone: a side effect is
//! only ever reported on the transition that enters its stage.

use super::session::WizardSession;
use super::stage::{Advance, SideEffect, StageSpec};
use crate::hardware::TemperatureGate;
use crate::models::{Operation, Stage};

/// Events that can move an operation forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Operator pressed the stage button.
    UserConfirm,
    /// The stage delay ran out.
    TimerElapsed,
    /// A branch stage's temperature check came back.
    BranchResult(bool),
}

/// Result of `enter` or `advance`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: WizardSession,
    /// Stages entered by this transition, in order. A branch stage and its target both appear.
    /// Empty when the trigger did not apply to the current stage.
    pub entered: Vec<Stage>,
    /// Side effect of the last entered stage, to be run exactly once by the caller.
    pub effect: Option<SideEffect>,
}

impl Transition {
    fn unchanged(session: WizardSession) -> Self {
        Self {
            session,
            entered: Vec::new(),
            effect: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.session.current_stage
    }

    pub fn moved(&self) -> bool {
        !self.entered.is_empty()
    }

    /// The stage the session now rests on.
    pub fn spec(&self) -> Option<&'static StageSpec> {
        self.session.spec()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OperationStateMachine {
    gate: TemperatureGate,
}

impl OperationStateMachine {
    pub fn new(gate: TemperatureGate) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &TemperatureGate {
        &self.gate
    }

    /// Places `session` on the entry stage for `operation` and evaluates it.
    pub fn enter(&self, operation: Operation, mut session: WizardSession) -> Transition {
        session.operation = operation;
        let stage = operation.entry_stage(session.filament.enabled);
        tracing::debug!(
            "Session {} entering {} at stage {} (filament enabled: {})",
            session.id,
            operation,
            stage,
            session.filament.enabled
        );
        self.enter_stage(session, stage)
    }

    /// Moves to the next stage if `trigger` is what the current stage is waiting for.
    pub fn advance(&self, session: WizardSession, trigger: Trigger) -> Transition {
        let Some(spec) = session.spec() else {
            tracing::warn!(
                "Session {} is on unknown stage {} of {}",
                session.id,
                session.current_stage,
                session.operation
            );
            return Transition::unchanged(session);
        };
        match next_stage(spec, trigger) {
            Some(next) => {
                tracing::debug!(
                    "{} stage {} -> {} on {:?}",
                    session.operation,
                    spec.stage,
                    next,
                    trigger
                );
                self.enter_stage(session, next)
            }
            None => {
                tracing::debug!(
                    "{} stage {} ignores {:?}",
                    session.operation,
                    spec.stage,
                    trigger
                );
                Transition::unchanged(session)
            }
        }
    }

    fn enter_stage(&self, mut session: WizardSession, mut stage: Stage) -> Transition {
        let mut entered = Vec::new();
        loop {
            session.current_stage = stage;
            entered.push(stage);
            let Some(spec) = session.spec() else {
                tracing::warn!("{} has no stage {}", session.operation, stage);
                return Transition {
                    session,
                    entered,
                    effect: None,
                };
            };
            if !matches!(spec.advance, Advance::Branch { .. }) {
                return Transition {
                    session,
                    entered,
                    effect: spec.effect,
                };
            }
            let ready = self.gate.is_ready(&session);
            match next_stage(spec, Trigger::BranchResult(ready)) {
                Some(next) => stage = next,
                None => {
                    return Transition {
                        session,
                        entered,
                        effect: None,
                    };
                }
            }
        }
    }
}

fn next_stage(spec: &StageSpec, trigger: Trigger) -> Option<Stage> {
    match (spec.advance, trigger) {
        (Advance::Confirm { next, .. }, Trigger::UserConfirm) => Some(next),
        (Advance::Timer { next }, Trigger::TimerElapsed) => Some(next),
        (Advance::Branch { ready, not_ready }, Trigger::BranchResult(passed)) => {
            Some(if passed { ready } else { not_ready })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilamentState, Slot, Spool};
    use crate::wizard::session::SlotPick;

    fn machine() -> OperationStateMachine {
        OperationStateMachine::new(TemperatureGate::new(215.0, 20.0))
    }

    fn session(operation: Operation, enabled: bool, hotend: f64) -> WizardSession {
        let slot = Slot::new(2, 5).unwrap();
        let pick = SlotPick {
            slot,
            filament: FilamentState {
                id: 2,
                name: "Galaxy Black (PLA)".to_string(),
                color: "#111111".to_string(),
                enabled,
            },
            spool: Some(Spool {
                id: 4,
                name: "Galaxy Black".to_string(),
                material: Some("PLA".to_string()),
                color: Some("#111111".to_string()),
                temperature_offset: Some(0.0),
            }),
        };
        WizardSession::new(1, operation, pick, None, hotend)
    }

    /// Drives an operation to its end, pressing the button or letting the timer run as each stage
    /// requires, and collects every stage entered together with the side effects reported.
    fn run_to_end(operation: Operation, enabled: bool, hotend: f64) -> (Vec<Stage>, Vec<SideEffect>) {
        let machine = machine();
        let mut transition = machine.enter(operation, session(operation, enabled, hotend));
        let mut stages = transition.entered.clone();
        let mut effects: Vec<_> = transition.effect.into_iter().collect();
        loop {
            let trigger = match transition.spec().map(|spec| spec.advance) {
                Some(Advance::Confirm { .. }) => Trigger::UserConfirm,
                Some(Advance::Timer { .. }) => Trigger::TimerElapsed,
                _ => break,
            };
            transition = machine.advance(transition.session, trigger);
            assert!(transition.moved());
            stages.extend(transition.entered.iter().copied());
            effects.extend(transition.effect);
        }
        (stages, effects)
    }

    #[test]
    fn test_entry_stage_table() {
        let expected = [
            (Operation::Load, true, 1),
            (Operation::Load, false, 3),
            (Operation::Unload, true, 1),
            (Operation::Unload, false, 11),
            (Operation::LoadToNozzle, true, 1),
            (Operation::LoadToNozzle, false, 0),
            (Operation::UnloadFromNozzle, true, 1),
            (Operation::UnloadFromNozzle, false, 0),
            (Operation::Cut, true, 1),
            (Operation::Cut, false, 0),
            (Operation::Eject, true, 1),
            (Operation::Eject, false, 0),
        ];
        for (operation, enabled, stage) in expected {
            let transition = machine().enter(operation, session(operation, enabled, 25.0));
            assert_eq!(transition.stage(), Stage(stage), "{} enabled={}", operation, enabled);
        }
    }

    #[test]
    fn test_load_with_filament_visits_every_stage() {
        let (stages, effects) = run_to_end(Operation::Load, true, 25.0);
        assert_eq!(stages, (1..=7).map(Stage).collect::<Vec<_>>());
        assert_eq!(
            effects,
            vec![
                SideEffect::ReleaseSpool,
                SideEffect::Dispatch,
                SideEffect::AssignSpool,
                SideEffect::Complete
            ]
        );
    }

    #[test]
    fn test_load_without_filament_skips_unload() {
        let (stages, effects) = run_to_end(Operation::Load, false, 25.0);
        assert_eq!(stages, (3..=7).map(Stage).collect::<Vec<_>>());
        assert!(!effects.contains(&SideEffect::ReleaseSpool));
    }

    #[test]
    fn test_unload_of_empty_slot_only_returns_to_picker() {
        let (stages, effects) = run_to_end(Operation::Unload, false, 25.0);
        assert_eq!(stages, vec![Stage(11), Stage(12)]);
        assert_eq!(effects, vec![SideEffect::ReturnToPicker]);
    }

    #[test]
    fn test_unload_releases_then_completes() {
        let (stages, effects) = run_to_end(Operation::Unload, true, 25.0);
        assert_eq!(stages, (1..=4).map(Stage).collect::<Vec<_>>());
        assert_eq!(effects, vec![SideEffect::ReleaseSpool, SideEffect::Complete]);
    }

    #[test]
    fn test_cold_hotend_branches_to_warning() {
        let machine = machine();
        let start = machine.enter(Operation::LoadToNozzle, session(Operation::LoadToNozzle, true, 190.0));
        assert_eq!(start.stage(), Stage(1));
        let branched = machine.advance(start.session, Trigger::TimerElapsed);
        assert_eq!(branched.entered, vec![Stage(2), Stage(3)]);
        assert_eq!(branched.effect, None);
        assert_eq!(branched.session.view().button.as_deref(), Some("continue"));
        let ready = machine.advance(branched.session, Trigger::UserConfirm);
        assert_eq!(ready.stage(), Stage(4));
    }

    #[test]
    fn test_hot_hotend_skips_warning() {
        let machine = machine();
        let start = machine.enter(Operation::LoadToNozzle, session(Operation::LoadToNozzle, true, 200.0));
        let branched = machine.advance(start.session, Trigger::TimerElapsed);
        assert_eq!(branched.entered, vec![Stage(2), Stage(4)]);
    }

    #[test]
    fn test_nozzle_paths_depend_on_temperature() {
        let (cold, _) = run_to_end(Operation::UnloadFromNozzle, false, 25.0);
        assert_eq!(cold, (0..=7).map(Stage).collect::<Vec<_>>());
        let (hot, effects) = run_to_end(Operation::UnloadFromNozzle, true, 230.0);
        assert_eq!(hot, vec![1, 2, 4, 5, 6, 7].into_iter().map(Stage).collect::<Vec<_>>());
        assert_eq!(effects, vec![SideEffect::Dispatch, SideEffect::Complete]);
    }

    #[test]
    fn test_cut_and_eject_share_shape() {
        for operation in [Operation::Cut, Operation::Eject] {
            let (stages, effects) = run_to_end(operation, false, 25.0);
            assert_eq!(stages, (0..=4).map(Stage).collect::<Vec<_>>());
            assert_eq!(effects, vec![SideEffect::Dispatch, SideEffect::Complete]);
        }
    }

    #[test]
    fn test_wrong_trigger_is_ignored_without_side_effect() {
        let machine = machine();
        let start = machine.enter(Operation::Load, session(Operation::Load, true, 25.0));
        let ignored = machine.advance(start.session.clone(), Trigger::TimerElapsed);
        assert!(!ignored.moved());
        assert_eq!(ignored.effect, None);
        assert_eq!(ignored.session, start.session);

        let releasing = machine.advance(start.session, Trigger::UserConfirm);
        assert_eq!(releasing.effect, Some(SideEffect::ReleaseSpool));
        // A stray confirm while the timer stage runs must not re-fire the release.
        let again = machine.advance(releasing.session.clone(), Trigger::UserConfirm);
        assert!(!again.moved());
        assert_eq!(again.effect, None);
    }

    #[test]
    fn test_stages_never_decrease() {
        for operation in Operation::ALL {
            for enabled in [true, false] {
                for hotend in [25.0, 250.0] {
                    let (stages, _) = run_to_end(operation, enabled, hotend);
                    assert!(stages.windows(2).all(|w| w[0] < w[1]), "{} {:?}", operation, stages);
                }
            }
        }
    }

    #[test]
    fn test_spool_offset_raises_branch_threshold() {
        let machine = machine();
        let mut hot_spool = session(Operation::LoadToNozzle, true, 205.0);
        if let Some(spool) = hot_spool.spool.as_mut() {
            spool.temperature_offset = Some(30.0);
        }
        let start = machine.enter(Operation::LoadToNozzle, hot_spool);
        let branched = machine.advance(start.session, Trigger::TimerElapsed);
        assert_eq!(branched.stage(), Stage(3));
    }
}
