//! Data models shared by the wizard, the filament collaborators and the binary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color used when a filament or spool carries no color of its own.
pub const DEFAULT_COLOR: &str = "#FFF";

/// Spool id meaning "no spool loaded".
pub const UNLOADED_SPOOL_ID: i64 = -1;

/// The guided MMU procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Load,
    Unload,
    #[serde(rename = "load-nozzle")]
    LoadToNozzle,
    #[serde(rename = "unload-nozzle")]
    UnloadFromNozzle,
    Cut,
    Eject,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Load,
        Operation::Unload,
        Operation::LoadToNozzle,
        Operation::UnloadFromNozzle,
        Operation::Cut,
        Operation::Eject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Load => "load",
            Operation::Unload => "unload",
            Operation::LoadToNozzle => "load-nozzle",
            Operation::UnloadFromNozzle => "unload-nozzle",
            Operation::Cut => "cut",
            Operation::Eject => "eject",
        }
    }

    /// Whether the operator picks a new spool before this operation runs.
    pub fn picks_spool(&self) -> bool {
        matches!(
            self,
            Operation::Load | Operation::LoadToNozzle | Operation::UnloadFromNozzle
        )
    }

    /// Nozzle operations share the temperature-gated stage table.
    pub fn is_nozzle_operation(&self) -> bool {
        matches!(self, Operation::LoadToNozzle | Operation::UnloadFromNozzle)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

/// A 1-based physical filament channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Slot(u8);

impl Slot {
    /// Builds a slot, rejecting 0 and anything above `slot_count`.
    pub fn new(number: u8, slot_count: u8) -> Option<Self> {
        (1..=slot_count).contains(&number).then_some(Self(number))
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// Zero-based channel index used at the hardware and filament-manager boundary.
    pub fn channel(&self) -> usize {
        usize::from(self.0) - 1
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-slot filament record. `enabled == false` means the slot is considered empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilamentState {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub enabled: bool,
}

impl FilamentState {
    pub fn empty(slot: Slot) -> Self {
        Self {
            id: u32::from(slot.number()),
            name: "empty".to_string(),
            color: DEFAULT_COLOR.to_string(),
            enabled: false,
        }
    }

    /// Placeholder shown when no filament source reports anything for a channel.
    pub fn placeholder(id: u32) -> Self {
        Self {
            id,
            name: format!("Filament {}", id),
            color: DEFAULT_COLOR.to_string(),
            enabled: true,
        }
    }

    /// Filament description of `spool` sitting in channel `id`.
    pub fn from_spool(id: u32, spool: &Spool) -> Self {
        Self {
            id,
            name: spool.display_name(),
            color: spool.color.clone().unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            enabled: spool.is_loaded(),
        }
    }
}

/// A physical filament reel as known by the filament manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spool {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub temperature_offset: Option<f64>,
}

impl Spool {
    pub fn unloaded() -> Self {
        Self {
            id: UNLOADED_SPOOL_ID,
            name: String::new(),
            material: None,
            color: None,
            temperature_offset: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.id > UNLOADED_SPOOL_ID
    }

    /// `name (material)`, or just `name` when the material is unknown.
    pub fn display_name(&self) -> String {
        match self.material.as_deref() {
            Some(material) if !material.is_empty() => format!("{} ({})", self.name, material),
            _ => self.name.clone(),
        }
    }
}

/// Position inside one operation's stage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stage(pub u8);

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reading from the hotend temperature stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSample {
    pub current: f64,
    pub target: f64,
}
