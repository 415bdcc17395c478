// src/wizard/mod.rs - Guided MMU operations: stages, sessions, pages and the control loop
use thiserror::Error;

use crate::hardware::FilamentError;

pub mod controller;
pub mod machine;
pub mod pages;
pub mod session;
pub mod stage;

pub use controller::{WizardCommand, WizardController, WizardUpdate};
pub use machine::{OperationStateMachine, Transition, Trigger};
pub use pages::{Navigation, Page, PageController};
pub use session::{Selection, SlotPick, StageView, WizardSession};
pub use stage::{Advance, SideEffect, StageSpec};

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Filament mutation failed: {0}")]
    FilamentMutation(#[from] FilamentError),
    #[error("No {0} selected")]
    MissingSelection(&'static str),
    #[error("Slot {0} does not exist")]
    InvalidSlot(u8),
    #[error("Command not accepted on page {0}")]
    UnexpectedCommand(Page),
    #[error("Callback from generation {0} no longer matches the live session")]
    StaleCallback(u64),
    #[error("Command channel closed")]
    ChannelClosed,
}
