//! Machine type categories and their model encoding

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Category label → numeric code the trained model expects.
///
/// This table is the only place the encoding is defined. The form encoder
/// and the CSV loader both go through [`MachineType`].
pub const MACHINE_TYPE_CODES: [(&str, f64); 3] = [("L", 0.0), ("M", 1.0), ("H", 2.0)];

/// Machine quality variant (low / medium / high).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MachineType {
    Low,
    Medium,
    High,
}

impl MachineType {
    pub const ALL: [MachineType; 3] = [MachineType::Low, MachineType::Medium, MachineType::High];

    /// Single-letter label used on the form and in CSV files.
    pub fn label(&self) -> &'static str {
        MACHINE_TYPE_CODES[self.index()].0
    }

    /// Numeric code fed to the model.
    pub fn code(&self) -> f64 {
        MACHINE_TYPE_CODES[self.index()].1
    }

    fn index(&self) -> usize {
        match self {
            MachineType::Low => 0,
            MachineType::Medium => 1,
            MachineType::High => 2,
        }
    }
}

/// The label is not one of `L`, `M`, `H`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown machine type {0:?} (expected one of L, M, H)")]
pub struct UnknownMachineType(pub String);

impl FromStr for MachineType {
    type Err = UnknownMachineType;

    /// Exact, case-sensitive match against [`MACHINE_TYPE_CODES`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MACHINE_TYPE_CODES
            .iter()
            .position(|(label, _)| *label == s)
            .map(|idx| Self::ALL[idx])
            .ok_or_else(|| UnknownMachineType(s.to_string()))
    }
}

impl std::fmt::Display for MachineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
