//! Stage tables
//!
//! Each operation owns an ordered table of stages. A stage says what the operator is told, how
//! the wizard leaves it (button, timer or temperature branch) and which side effect fires when it
//! is entered. The state machine only ever looks stages up here.

use crate::models::{Operation, Stage};

/// Side effect fired once when a stage is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Tell the filament manager the slot is now empty.
    ReleaseSpool,
    /// Bind the newly picked spool to the slot.
    AssignSpool,
    /// Send the operation's MMU command.
    Dispatch,
    /// Operation finished; show the completion checkmark.
    Complete,
    /// Nothing to do; go back to the function picker.
    ReturnToPicker,
}

/// How the wizard leaves a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Wait for the operator to press the labeled button.
    Confirm { label: &'static str, next: Stage },
    /// Move on after the stage delay, button hidden.
    Timer { next: Stage },
    /// Evaluated immediately on entry from the hotend temperature.
    Branch { ready: Stage, not_ready: Stage },
    /// Terminal stage; its side effect hands control back to the page layer.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub stage: Stage,
    /// Operator message; `{slot}` and `{spool}` are filled in from the session.
    pub message: &'static str,
    pub effect: Option<SideEffect>,
    pub advance: Advance,
}

impl StageSpec {
    const fn confirm(stage: u8, message: &'static str, label: &'static str, next: u8) -> Self {
        Self {
            stage: Stage(stage),
            message,
            effect: None,
            advance: Advance::Confirm { label, next: Stage(next) },
        }
    }

    const fn timer(stage: u8, message: &'static str, next: u8) -> Self {
        Self {
            stage: Stage(stage),
            message,
            effect: None,
            advance: Advance::Timer { next: Stage(next) },
        }
    }

    const fn branch(stage: u8, message: &'static str, ready: u8, not_ready: u8) -> Self {
        Self {
            stage: Stage(stage),
            message,
            effect: None,
            advance: Advance::Branch {
                ready: Stage(ready),
                not_ready: Stage(not_ready),
            },
        }
    }

    const fn end(stage: u8, message: &'static str, effect: SideEffect) -> Self {
        Self {
            stage: Stage(stage),
            message,
            effect: Some(effect),
            advance: Advance::End,
        }
    }

    const fn with_effect(mut self, effect: SideEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Button label, when the stage waits for the operator.
    pub fn button(&self) -> Option<&'static str> {
        match self.advance {
            Advance::Confirm { label, .. } => Some(label),
            _ => None,
        }
    }

    /// Stages this one can lead to.
    pub fn successors(&self) -> Vec<Stage> {
        match self.advance {
            Advance::Confirm { next, .. } | Advance::Timer { next } => vec![next],
            Advance::Branch { ready, not_ready } => vec![ready, not_ready],
            Advance::End => Vec::new(),
        }
    }
}

const LOOKS_EMPTY: &str = "filament slot {slot} looks empty, continue?";
const CHECKING_TEMPERATURE: &str = "checking nozzle temperature...";
const NOT_HOT_ENOUGH: &str = "hotend may not be hot enough, continue?";

const LOAD: &[StageSpec] = &[
    StageSpec::confirm(1, "unload the filament from slot {slot}", "done unloading filament", 2),
    StageSpec::timer(2, "unloading filament...", 3).with_effect(SideEffect::ReleaseSpool),
    StageSpec::confirm(3, "get ready to load filament into slot {slot}", "ready to load", 4),
    StageSpec::confirm(4, "please load filament: {spool}", "done loading filament", 5)
        .with_effect(SideEffect::Dispatch),
    StageSpec::timer(5, "loading filament...", 6).with_effect(SideEffect::AssignSpool),
    StageSpec::timer(6, "filament change complete!", 7),
    StageSpec::end(7, "filament change complete!", SideEffect::Complete),
];

const UNLOAD: &[StageSpec] = &[
    StageSpec::confirm(1, "unload the filament from slot {slot}", "done unloading filament", 2),
    StageSpec::timer(2, "unloading filament...", 3).with_effect(SideEffect::ReleaseSpool),
    StageSpec::timer(3, "filament unload complete!", 4),
    StageSpec::end(4, "filament unload complete!", SideEffect::Complete),
    StageSpec::confirm(11, "filament slot {slot} is already empty!", "return to menu", 12),
    StageSpec::end(12, "filament slot {slot} is already empty!", SideEffect::ReturnToPicker),
];

const LOAD_TO_NOZZLE: &[StageSpec] = &[
    StageSpec::confirm(0, LOOKS_EMPTY, "continue", 1),
    StageSpec::timer(1, CHECKING_TEMPERATURE, 2),
    StageSpec::branch(2, CHECKING_TEMPERATURE, 4, 3),
    StageSpec::confirm(3, NOT_HOT_ENOUGH, "continue", 4),
    StageSpec::confirm(4, "ready to load filament to nozzle", "start load to nozzle", 5),
    StageSpec::confirm(5, "loading filament to nozzle...", "done loading to nozzle", 6)
        .with_effect(SideEffect::Dispatch),
    StageSpec::timer(6, "load to nozzle complete!", 7),
    StageSpec::end(7, "load to nozzle complete!", SideEffect::Complete),
];

const UNLOAD_FROM_NOZZLE: &[StageSpec] = &[
    StageSpec::confirm(0, LOOKS_EMPTY, "continue", 1),
    StageSpec::timer(1, CHECKING_TEMPERATURE, 2),
    StageSpec::branch(2, CHECKING_TEMPERATURE, 4, 3),
    StageSpec::confirm(3, NOT_HOT_ENOUGH, "continue", 4),
    StageSpec::confirm(4, "ready to unload filament from nozzle", "start unload from nozzle", 5),
    StageSpec::confirm(5, "unloading filament from nozzle...", "done unloading from nozzle", 6)
        .with_effect(SideEffect::Dispatch),
    StageSpec::timer(6, "unload from nozzle complete!", 7),
    StageSpec::end(7, "unload from nozzle complete!", SideEffect::Complete),
];

const CUT: &[StageSpec] = &[
    StageSpec::confirm(0, LOOKS_EMPTY, "continue", 1),
    StageSpec::confirm(1, "ready to cut filament", "start cut", 2),
    StageSpec::confirm(2, "cutting filament...", "done cutting filament", 3)
        .with_effect(SideEffect::Dispatch),
    StageSpec::timer(3, "cut filament complete!", 4),
    StageSpec::end(4, "cut filament complete!", SideEffect::Complete),
];

const EJECT: &[StageSpec] = &[
    StageSpec::confirm(0, LOOKS_EMPTY, "continue", 1),
    StageSpec::confirm(1, "ready to eject filament", "start eject", 2),
    StageSpec::confirm(2, "ejecting filament...", "done ejecting filament", 3)
        .with_effect(SideEffect::Dispatch),
    StageSpec::timer(3, "eject filament complete!", 4),
    StageSpec::end(4, "eject filament complete!", SideEffect::Complete),
];

impl Operation {
    pub fn stage_table(&self) -> &'static [StageSpec] {
        match self {
            Operation::Load => LOAD,
            Operation::Unload => UNLOAD,
            Operation::LoadToNozzle => LOAD_TO_NOZZLE,
            Operation::UnloadFromNozzle => UNLOAD_FROM_NOZZLE,
            Operation::Cut => CUT,
            Operation::Eject => EJECT,
        }
    }

    pub fn stage_spec(&self, stage: Stage) -> Option<&'static StageSpec> {
        self.stage_table().iter().find(|spec| spec.stage == stage)
    }

    /// First stage of the operation given whether the slot currently holds filament.
    pub fn entry_stage(&self, filament_enabled: bool) -> Stage {
        match (self, filament_enabled) {
            (Operation::Load, false) => Stage(3),
            (Operation::Unload, false) => Stage(11),
            (_, false) => Stage(0),
            (_, true) => Stage(1),
        }
    }
}
