// src/lib.rs - MMU filament wizard library
pub mod config;
pub mod filament;
pub mod hardware;
pub mod models;
pub mod simulator;
pub mod wizard;

pub use config::{Config, WizardConfig};
pub use models::{FilamentState, Operation, Slot, Spool, Stage, TemperatureSample};
pub use wizard::{WizardCommand, WizardController, WizardError, WizardUpdate};
