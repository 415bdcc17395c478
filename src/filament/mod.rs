// src/filament/mod.rs - Filament manager facing side of the wizard
pub mod catalog;
pub mod coordinator;
pub mod picker;

pub use catalog::{FilamentCatalog, SlotEntry};
pub use coordinator::{SpoolChange, SpoolMutationCoordinator};
pub use picker::{FilamentPicker, FilamentSelect};
