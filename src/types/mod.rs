//! Shared data structures for the maintenance pipelines
//!
//! - Machine type categories and their fixed encoding table
//! - Maintenance labels and the decision threshold

mod machine;
mod prediction;

pub use machine::{MachineType, UnknownMachineType, MACHINE_TYPE_CODES};
pub use prediction::{MaintenanceLabel, Prediction, FAILURE_THRESHOLD};
