//! Defines the channel messages between the wizard and the task that owns the printer connection.

use tokio::sync::mpsc;

use super::hardware_traits::{PrinterControl, PrinterError};

/// Represents a request sent from the wizard to the printer task.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterRequest {
    /// Execute a G-code command.
    ExecuteGcode { command: String },
    /// Change the hotend target temperature.
    SetHotendTarget { temperature: f64 },
}

/// `PrinterControl` that forwards every request to the printer task without waiting on it.
#[derive(Debug, Clone)]
pub struct ChannelPrinter {
    tx: mpsc::UnboundedSender<PrinterRequest>,
}

impl ChannelPrinter {
    pub fn new(tx: mpsc::UnboundedSender<PrinterRequest>) -> Self {
        Self { tx }
    }

    /// Creates a printer handle together with the receiving end for the printer task.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PrinterRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn submit(&self, request: PrinterRequest) -> Result<(), PrinterError> {
        self.tx.send(request).map_err(|_| PrinterError::ChannelClosed)
    }
}

impl PrinterControl for ChannelPrinter {
    fn send_command(&self, command: &str) -> Result<(), PrinterError> {
        self.submit(PrinterRequest::ExecuteGcode {
            command: command.to_string(),
        })
    }

    fn set_hotend_target(&self, temperature: f64) -> Result<(), PrinterError> {
        self.submit(PrinterRequest::SetHotendTarget { temperature })
    }
}
