// Trait-based interfaces for the printer and filament collaborators

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FilamentState, Spool};

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("Printer request channel closed")]
    ChannelClosed,
    #[error("Printer rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum FilamentError {
    #[error("Filament manager rejected request: {0}")]
    Rejected(String),
    #[error("Filament source does not support {0}")]
    Unsupported(&'static str),
    #[error("Channel {0} does not exist")]
    ChannelOutOfRange(usize),
    #[error("Filament {0} has no channel")]
    UnknownFilament(u32),
}

/// Printer-side collaborator.
///
/// Both calls submit a request and return as soon as it is queued. The printer never reports
/// command completion back through this interface.
pub trait PrinterControl: Send + Sync {
    fn send_command(&self, command: &str) -> Result<(), PrinterError>;
    fn set_hotend_target(&self, temperature: f64) -> Result<(), PrinterError>;
}

/// Source of per-slot filament data, optionally backed by a spool-owning filament manager.
#[async_trait]
pub trait FilamentSource: Send + Sync {
    async fn list_filaments(&self) -> Result<Vec<FilamentState>, FilamentError>;

    /// Spools currently assigned to each channel, indexed by zero-based channel.
    async fn list_spools(&self) -> Result<Vec<Spool>, FilamentError> {
        Err(FilamentError::Unsupported("spool listing"))
    }

    async fn set_spool_at_channel(&self, spool: &Spool, channel: usize) -> Result<(), FilamentError>;

    /// Asks the MMU plugin to feed zero-based `channel` for the pending tool change.
    async fn select_filament(&self, _channel: usize) -> Result<(), FilamentError> {
        Err(FilamentError::Unsupported("filament select"))
    }
}
