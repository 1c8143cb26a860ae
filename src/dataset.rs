//! Sensor log CSV loading.
//!
//! Reads a comma-separated file with a header row and selects numeric
//! columns by name, in the caller's order. Quoted fields (including commas
//! inside quotes) are handled. A `Type` column holding machine type labels
//! is encoded through the shared machine-type table.
//!
//! # Usage
//!
//! ```ignore
//! use predmaint::dataset::{SensorTable, SENSOR_COLUMNS};
//!
//! let table = SensorTable::load("sensors_data.csv", &SENSOR_COLUMNS)?;
//! for row in table.rows() {
//!     // row[0] = Rotational_speed, row[1] = Torque, ...
//! }
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::types::MachineType;

/// Columns consumed by the monitoring and retraining pipelines, in order.
pub const SENSOR_COLUMNS: [&str; 5] = [
    "Rotational_speed",
    "Torque",
    "Tool_wear",
    "Vibration",
    "Process_temperature",
];

/// Column whose cells are machine type labels (`L`/`M`/`H`).
pub const MACHINE_TYPE_COLUMN: &str = "Type";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data file is empty (no header row)")]
    Empty,

    #[error("data file is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}, column {column}: {value:?} is not numeric")]
    InvalidCell {
        line: usize,
        column: String,
        value: String,
    },
}

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
/// Returns owned strings because quoted fields need unquoting.
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    // Escaped quote ("")
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Parse one selected cell.
fn parse_cell(column: &str, raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if column == MACHINE_TYPE_COLUMN {
        if let Ok(machine_type) = raw.parse::<MachineType>() {
            return Some(machine_type.code());
        }
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Numeric rows selected from a CSV file, columns in requested order.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl SensorTable {
    /// Load `columns` from the CSV at `path`.
    pub fn load<S: AsRef<str>>(
        path: impl AsRef<Path>,
        columns: &[S],
    ) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::from_reader(BufReader::new(file), columns).map_err(|e| match e {
            DatasetError::Io { source, .. } => DatasetError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        info!(
            path = %path.display(),
            rows = table.len(),
            columns = table.columns.len(),
            "Loaded sensor data"
        );
        Ok(table)
    }

    /// Parse CSV text from any buffered reader.
    ///
    /// Every missing column is reported at once. Blank lines are skipped.
    pub fn from_reader<R: BufRead, S: AsRef<str>>(
        reader: R,
        columns: &[S],
    ) -> Result<Self, DatasetError> {
        let io_err = |source| DatasetError::Io {
            path: PathBuf::new(),
            source,
        };
        let mut lines = reader.lines().enumerate();

        let header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line.map_err(io_err)?;
                    if !line.trim().is_empty() {
                        break csv_split(line.trim_start_matches('\u{feff}'));
                    }
                }
                None => return Err(DatasetError::Empty),
            }
        };
        let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();

        let mut indices = Vec::with_capacity(columns.len());
        let mut missing = Vec::new();
        for column in columns {
            let column = column.as_ref();
            match header.iter().position(|h| h == column) {
                Some(idx) => indices.push(idx),
                None => missing.push(column.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns(missing));
        }

        let names: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let mut rows = Vec::new();

        for (idx, line) in lines {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let fields = csv_split(&line);
            if fields.len() != header.len() {
                return Err(DatasetError::RaggedRow {
                    line: line_no,
                    expected: header.len(),
                    found: fields.len(),
                });
            }

            let row = indices
                .iter()
                .zip(&names)
                .map(|(&i, name)| {
                    parse_cell(name, &fields[i]).ok_or_else(|| DatasetError::InvalidCell {
                        line: line_no,
                        column: name.clone(),
                        value: fields[i].clone(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            rows.push(row);
        }

        Ok(Self {
            columns: names,
            rows,
        })
    }

    /// Build directly from already-numeric rows.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}
