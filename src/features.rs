//! Feature encoder: raw form text → fixed-order model feature vector.
//!
//! The form supplies a machine type label plus five free-text numbers. The
//! encoder maps the label through [`MACHINE_TYPE_CODES`] and parses each
//! number strictly. Nothing here touches the model, so malformed input is
//! rejected before any inference call can happen.
//!
//! [`MACHINE_TYPE_CODES`]: crate::types::MACHINE_TYPE_CODES

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{MachineType, UnknownMachineType};

/// Width of the form feature vector.
pub const FORM_FEATURE_WIDTH: usize = 6;

/// Feature names in model input order.
pub const FORM_FEATURE_NAMES: [&str; FORM_FEATURE_WIDTH] = [
    "machine_type",
    "air_temperature",
    "process_temperature",
    "rotational_speed",
    "torque",
    "tool_wear",
];

/// Encoded form input, ordered as [`FORM_FEATURE_NAMES`].
pub type FeatureVector = [f64; FORM_FEATURE_WIDTH];

/// Raw, unvalidated form contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormInput {
    pub machine_type: String,
    pub air_temperature: String,
    pub process_temperature: String,
    pub rotational_speed: String,
    pub torque: String,
    pub tool_wear: String,
}

/// Malformed form input. Reported to the user; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error(transparent)]
    UnknownMachineType(#[from] UnknownMachineType),

    #[error("{field}: {value:?} is not a valid number")]
    InvalidNumber { field: &'static str, value: String },
}

/// Parse one numeric field. Surrounding whitespace is ignored; empty,
/// non-numeric and non-finite values are rejected.
pub fn parse_number(field: &'static str, raw: &str) -> Result<f64, InputError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

/// Encode a form into the model's feature vector.
///
/// Fields are checked in display order, so the first bad field is the one
/// reported.
pub fn encode(input: &FormInput) -> Result<FeatureVector, InputError> {
    let machine_type: MachineType = input.machine_type.parse()?;

    Ok([
        machine_type.code(),
        parse_number(FORM_FEATURE_NAMES[1], &input.air_temperature)?,
        parse_number(FORM_FEATURE_NAMES[2], &input.process_temperature)?,
        parse_number(FORM_FEATURE_NAMES[3], &input.rotational_speed)?,
        parse_number(FORM_FEATURE_NAMES[4], &input.torque)?,
        parse_number(FORM_FEATURE_NAMES[5], &input.tool_wear)?,
    ])
}
