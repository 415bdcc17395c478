// src/filament/picker.rs - Tool-change filament picker for the MMU plugin
use serde::Serialize;
use std::sync::Arc;

use super::catalog::FilamentCatalog;
use crate::config::FilamentSourceKind;
use crate::hardware::{FilamentError, FilamentSource};
use crate::models::FilamentState;

/// Request body the MMU plugin expects for a filament choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilamentSelect {
    /// Zero-based channel.
    pub choice: usize,
    pub command: &'static str,
}

impl FilamentSelect {
    pub const COMMAND: &'static str = "select";

    /// Select request for a 1-based filament id. Id 0 has no channel.
    pub fn for_filament(filament: &FilamentState) -> Option<Self> {
        let choice = filament.id.checked_sub(1)?;
        Some(Self {
            choice: usize::try_from(choice).ok()?,
            command: Self::COMMAND,
        })
    }
}

/// Picker shown when the printer pauses for a tool change and asks which filament to feed.
pub struct FilamentPicker {
    catalog: FilamentCatalog,
    source: Arc<dyn FilamentSource>,
    filaments: Vec<FilamentState>,
    visible: bool,
}

impl FilamentPicker {
    pub fn new(source: Arc<dyn FilamentSource>, kind: FilamentSourceKind, slot_count: u8) -> Self {
        let filaments = (1..=u32::from(slot_count)).map(FilamentState::placeholder).collect();
        Self {
            catalog: FilamentCatalog::new(source.clone(), kind, slot_count),
            source,
            filaments,
            visible: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn filaments(&self) -> &[FilamentState] {
        &self.filaments
    }

    /// Shows the picker with the list refreshed from the filament source.
    pub async fn show(&mut self) {
        self.visible = true;
        self.filaments = self
            .catalog
            .refresh()
            .await
            .into_iter()
            .map(|entry| entry.filament)
            .collect();
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Hides the picker and asks the plugin to feed `filament`.
    pub async fn select(&mut self, filament: &FilamentState) -> Result<FilamentSelect, FilamentError> {
        self.hide();
        let request = FilamentSelect::for_filament(filament)
            .ok_or(FilamentError::UnknownFilament(filament.id))?;
        self.source.select_filament(request.choice).await?;
        tracing::info!("Filament {} ({}) selected for tool change", filament.id, filament.name);
        Ok(request)
    }
}
