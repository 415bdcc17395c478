// src/hardware/mod.rs
// Declare the submodules within the `hardware` module
pub mod dispatcher;
pub mod hardware_traits;
pub mod printer_channel;
pub mod temperature;

// Re-export items you want easily accessible from the `hardware` module level
pub use dispatcher::{HardwareCommandDispatcher, command_for};
pub use hardware_traits::{FilamentError, FilamentSource, PrinterControl, PrinterError};
pub use printer_channel::{ChannelPrinter, PrinterRequest};
pub use temperature::TemperatureGate;
