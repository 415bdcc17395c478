// src/filament/catalog.rs
use std::sync::Arc;

use crate::config::FilamentSourceKind;
use crate::hardware::{FilamentError, FilamentSource};
use crate::models::{FilamentState, Spool};

/// What the slot picker shows for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotEntry {
    pub filament: FilamentState,
    pub spool: Option<Spool>,
}

/// Builds the per-slot filament list at the start of a wizard session.
#[derive(Clone)]
pub struct FilamentCatalog {
    source: Arc<dyn FilamentSource>,
    kind: FilamentSourceKind,
    slot_count: u8,
}

impl FilamentCatalog {
    pub fn new(source: Arc<dyn FilamentSource>, kind: FilamentSourceKind, slot_count: u8) -> Self {
        Self {
            source,
            kind,
            slot_count,
        }
    }

    pub fn slot_count(&self) -> u8 {
        self.slot_count
    }

    /// Current slot list. A failing or empty source falls back to placeholder filaments, so the
    /// plugin's own list only shows when it has entries.
    pub async fn refresh(&self) -> Vec<SlotEntry> {
        let entries = match self.fetch().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Filament source unavailable, using placeholders: {}", e);
                Vec::new()
            }
        };
        self.fill_to_slot_count(entries)
    }

    async fn fetch(&self) -> Result<Vec<SlotEntry>, FilamentError> {
        match self.kind {
            FilamentSourceKind::Manager => {
                let spools = self.source.list_spools().await?;
                Ok(spools
                    .into_iter()
                    .enumerate()
                    .map(|(channel, spool)| SlotEntry {
                        filament: FilamentState::from_spool(channel as u32 + 1, &spool),
                        spool: Some(spool),
                    })
                    .collect())
            }
            FilamentSourceKind::Plugin => {
                let filaments = self.source.list_filaments().await?;
                if filaments.is_empty() {
                    tracing::debug!("MMU plugin reports no filaments, using placeholders");
                }
                Ok(filaments
                    .into_iter()
                    .map(|filament| SlotEntry { filament, spool: None })
                    .collect())
            }
        }
    }

    fn fill_to_slot_count(&self, mut entries: Vec<SlotEntry>) -> Vec<SlotEntry> {
        let slot_count = usize::from(self.slot_count);
        entries.truncate(slot_count);
        for id in entries.len() + 1..=slot_count {
            entries.push(SlotEntry {
                filament: FilamentState::placeholder(id as u32),
                spool: None,
            });
        }
        entries
    }
}
