//! # Wizard Configuration
//!
//! Read-only settings for the filament wizard and the simulated collaborators used by the binary.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [wizard]
//! default_hotend_temperature = 215.0
//! filament_source = "manager"
//! slot_count = 5
//!
//! [[simulator.spools]]
//! id = 3
//! name = "Galaxy Black"
//! material = "PLA"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::Spool;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Where per-slot filament data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilamentSourceKind {
    /// A generic filament manager that owns spools and accepts spool assignments.
    #[default]
    Manager,
    /// The MMU vendor plugin's own filament list.
    Plugin,
}

/// Wizard behaviour settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WizardConfig {
    #[serde(default = "default_hotend_temperature")]
    pub default_hotend_temperature: f64,
    /// Degrees below the wanted temperature still counted as hot enough.
    #[serde(default = "default_temperature_tolerance")]
    pub temperature_tolerance: f64,
    #[serde(default)]
    pub filament_source: FilamentSourceKind,
    #[serde(default = "default_slot_count")]
    pub slot_count: u8,
    /// Delay before a timer stage advances on its own.
    #[serde(default = "default_stage_delay_ms")]
    pub stage_delay_ms: u64,
    /// How long the completion checkmark stays up before returning to the function picker.
    #[serde(default = "default_checkmark_delay_ms")]
    pub checkmark_delay_ms: u64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            default_hotend_temperature: default_hotend_temperature(),
            temperature_tolerance: default_temperature_tolerance(),
            filament_source: FilamentSourceKind::default(),
            slot_count: default_slot_count(),
            stage_delay_ms: default_stage_delay_ms(),
            checkmark_delay_ms: default_checkmark_delay_ms(),
        }
    }
}

impl WizardConfig {
    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }

    pub fn checkmark_delay(&self) -> Duration {
        Duration::from_millis(self.checkmark_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.slot_count == 0 {
            return Err("slot_count must be at least 1".to_string());
        }
        if self.default_hotend_temperature <= 0.0 {
            return Err("default_hotend_temperature must be > 0".to_string());
        }
        if self.temperature_tolerance < 0.0 {
            return Err("temperature_tolerance must not be negative".to_string());
        }
        if self.stage_delay_ms == 0 || self.checkmark_delay_ms == 0 {
            return Err("stage and checkmark delays must be > 0".to_string());
        }
        Ok(())
    }
}

/// Settings for the simulated printer and filament manager driven by the binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_ambient_temperature")]
    pub ambient_temperature: f64,
    /// Hotend target when the simulation starts.
    #[serde(default)]
    pub hotend_target: f64,
    /// Make every spool assignment fail.
    #[serde(default)]
    pub fail_mutations: bool,
    /// Spool inventory known to the simulated filament manager.
    #[serde(default)]
    pub spools: Vec<Spool>,
    /// Spool id loaded in each channel at start, `-1` for empty.
    #[serde(default)]
    pub loaded: Vec<i64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            ambient_temperature: default_ambient_temperature(),
            hotend_target: 0.0,
            fail_mutations: false,
            spools: Vec::new(),
            loaded: Vec::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wizard.validate().map_err(ConfigError::Invalid)?;
        if self.simulator.loaded.len() > usize::from(self.wizard.slot_count) {
            return Err(ConfigError::Invalid(format!(
                "simulator.loaded lists {} channels but slot_count is {}",
                self.simulator.loaded.len(),
                self.wizard.slot_count
            )));
        }
        Ok(())
    }
}

// Default value functions
fn default_hotend_temperature() -> f64 { 215.0 }
fn default_temperature_tolerance() -> f64 { 20.0 }
fn default_slot_count() -> u8 { 5 }
fn default_stage_delay_ms() -> u64 { 1500 }
fn default_checkmark_delay_ms() -> u64 { 1350 }
fn default_ambient_temperature() -> f64 { 25.0 }

/// Load and validate configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}
