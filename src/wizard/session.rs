// src/wizard/session.rs
use serde::Serialize;
use uuid::Uuid;

use super::WizardError;
use super::stage::StageSpec;
use crate::filament::SpoolChange;
use crate::models::{FilamentState, Operation, Slot, Spool, Stage};

/// The slot the operator picked and what it held at that moment.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPick {
    pub slot: Slot,
    pub filament: FilamentState,
    pub spool: Option<Spool>,
}

/// Operator picks accumulated across the wizard pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub slot: Option<SlotPick>,
    pub operation: Option<Operation>,
    pub new_spool: Option<Spool>,
}

impl Selection {
    pub fn slot(&self) -> Option<Slot> {
        self.slot.as_ref().map(|pick| pick.slot)
    }

    /// Records the outcome of a spool mutation so later operations see the new slot contents.
    pub fn apply_change(&mut self, change: &SpoolChange) {
        if let Some(pick) = self.slot.as_mut() {
            pick.filament = change.filament.clone();
            pick.spool = Some(change.spool.clone());
        }
    }
}

/// State of one guided operation, threaded through every state machine transition.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardSession {
    pub id: Uuid,
    /// Run number the session was created under; timers scheduled for it carry the same value.
    pub generation: u64,
    pub operation: Operation,
    pub slot: Slot,
    pub current_stage: Stage,
    pub filament: FilamentState,
    pub spool: Option<Spool>,
    pub new_spool: Option<Spool>,
    pub hotend_current_temp: f64,
}

impl WizardSession {
    pub fn new(
        generation: u64,
        operation: Operation,
        pick: SlotPick,
        new_spool: Option<Spool>,
        hotend_current_temp: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            operation,
            slot: pick.slot,
            current_stage: operation.entry_stage(pick.filament.enabled),
            filament: pick.filament,
            spool: pick.spool,
            new_spool,
            hotend_current_temp,
        }
    }

    /// Starts a session from the operator's picks.
    pub fn from_selection(
        generation: u64,
        selection: &Selection,
        hotend_current_temp: f64,
    ) -> Result<Self, WizardError> {
        let operation = selection
            .operation
            .ok_or(WizardError::MissingSelection("operation"))?;
        let pick = selection
            .slot
            .clone()
            .ok_or(WizardError::MissingSelection("slot"))?;
        Ok(Self::new(
            generation,
            operation,
            pick,
            selection.new_spool.clone(),
            hotend_current_temp,
        ))
    }

    pub fn spec(&self) -> Option<&'static StageSpec> {
        self.operation.stage_spec(self.current_stage)
    }

    /// Session with the slot contents replaced by a mutation result.
    pub fn with_change(mut self, change: SpoolChange) -> Self {
        self.filament = change.filament;
        self.spool = Some(change.spool);
        self
    }

    /// What the operator sees for the current stage. Pure: rendering never fires side effects.
    pub fn view(&self) -> StageView {
        let spec = self.spec();
        let message = spec
            .map(|spec| {
                let spool_name = self
                    .new_spool
                    .as_ref()
                    .map(|spool| spool.name.as_str())
                    .unwrap_or("no spool selected");
                spec.message
                    .replace("{slot}", &self.slot.to_string())
                    .replace("{spool}", spool_name)
            })
            .unwrap_or_default();
        StageView {
            operation: self.operation,
            slot: self.slot,
            stage: self.current_stage,
            message,
            button: spec.and_then(|spec| spec.button()).map(str::to_string),
        }
    }
}

/// Rendered stage, handed to whatever draws the wizard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageView {
    pub operation: Operation,
    pub slot: Slot,
    pub stage: Stage,
    pub message: String,
    pub button: Option<String>,
}

impl StageView {
    pub fn hide_button(&self) -> bool {
        self.button.is_none()
    }
}
