// src/hardware/dispatcher.rs - Operation to MMU G-code mapping
use std::sync::Arc;

use super::hardware_traits::PrinterControl;
use crate::models::Operation;

/// G-code for `operation` on zero-based `channel`. Unload has no hardware command.
pub fn command_for(operation: Operation, channel: usize) -> Option<String> {
    match operation {
        Operation::Load => Some(format!("M704 P{}", channel)),
        Operation::LoadToNozzle => Some(format!("M701 P{}", channel)),
        Operation::UnloadFromNozzle => Some("M702".to_string()),
        Operation::Cut => Some(format!("M706 P{}", channel)),
        Operation::Eject => Some(format!("M705 P{}", channel)),
        Operation::Unload => None,
    }
}

/// Sends MMU commands to the printer. Fire-and-forget: nothing waits for the MMU to finish.
#[derive(Clone)]
pub struct HardwareCommandDispatcher {
    printer: Arc<dyn PrinterControl>,
}

impl HardwareCommandDispatcher {
    pub fn new(printer: Arc<dyn PrinterControl>) -> Self {
        Self { printer }
    }

    /// Submits the command for `operation`. Submit failures are logged, never raised.
    pub fn dispatch(&self, operation: Operation, channel: usize) {
        let Some(command) = command_for(operation, channel) else {
            tracing::debug!("{} has no MMU command", operation);
            return;
        };
        match self.printer.send_command(&command) {
            Ok(()) => tracing::info!("Dispatched {} for channel {}: {}", operation, channel, command),
            Err(e) => tracing::warn!("Failed to submit '{}': {}", command, e),
        }
    }
}
