//! Monitoring loop: replays a sensor log through the model and reports the
//! mean squared prediction error.
//!
//! There is no ground truth in the sensor log, so every score is compared
//! against [`PLACEHOLDER_REFERENCE`]. The pass covers every row except the
//! last one.

use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::dataset::SensorTable;
use crate::inference::{InferenceAdapter, ModelError};

/// Stand-in for the true label of every monitored row.
pub const PLACEHOLDER_REFERENCE: f64 = 0.0;

/// Progress is logged every this many rows.
const PROGRESS_EVERY: usize = 1000;

/// Per-row squared errors from one monitoring pass, in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorSeries {
    errors: Vec<f64>,
}

impl ErrorSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, squared_error: f64) {
        self.errors.push(squared_error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.errors
    }

    /// Arithmetic mean, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.errors.is_empty() {
            return None;
        }
        Some(self.errors.iter().mean())
    }

    /// Sample standard deviation, `None` below two values.
    pub fn std_dev(&self) -> Option<f64> {
        if self.errors.len() < 2 {
            return None;
        }
        Some(self.errors.iter().std_dev())
    }

    pub fn max(&self) -> Option<f64> {
        if self.errors.is_empty() {
            return None;
        }
        Some(Statistics::max(self.errors.iter()))
    }
}

/// Outcome of one monitoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringReport {
    /// Rows in the input table.
    pub rows_total: usize,
    /// Rows actually scored (`rows_total - 1`, or 0).
    pub rows_processed: usize,
    pub mean_squared_error: Option<f64>,
    pub series: ErrorSeries,
}

impl std::fmt::Display for MonitoringReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mean_squared_error {
            Some(mse) => write!(f, "Average prediction error: {mse}"),
            None => write!(f, "Average prediction error: n/a (no rows processed)"),
        }
    }
}

/// One bounded pass over a sensor table.
#[derive(Debug)]
pub struct MonitoringLoop<'a> {
    adapter: &'a InferenceAdapter,
    reference: f64,
}

impl<'a> MonitoringLoop<'a> {
    pub fn new(adapter: &'a InferenceAdapter) -> Self {
        Self {
            adapter,
            reference: PLACEHOLDER_REFERENCE,
        }
    }

    /// Compare scores against a different constant reference.
    #[must_use]
    pub fn with_reference(mut self, reference: f64) -> Self {
        self.reference = reference;
        self
    }

    /// Score rows `0..len-1`, one single-row batch per row.
    ///
    /// The first model error aborts the pass.
    pub fn run(self, table: &SensorTable) -> Result<MonitoringReport, ModelError> {
        let rows_total = table.len();
        let to_process = rows_total.saturating_sub(1);
        info!(rows = rows_total, scored = to_process, "Monitoring pass started");

        let mut series = ErrorSeries::new();
        for (idx, row) in table.rows().iter().take(to_process).enumerate() {
            let scores = self.adapter.scores(std::slice::from_ref(row))?;
            let score = scores[0];
            let error = (self.reference - score).powi(2);
            debug!(row = idx, score, error, "Scored row");
            series.push(error);

            if (idx + 1) % PROGRESS_EVERY == 0 {
                info!(processed = idx + 1, of = to_process, "Monitoring progress");
            }
        }

        let mean_squared_error = series.mean();
        info!(
            processed = series.len(),
            mse = ?mean_squared_error,
            std_dev = ?series.std_dev(),
            max = ?series.max(),
            "Monitoring pass finished"
        );

        Ok(MonitoringReport {
            rows_total,
            rows_processed: series.len(),
            mean_squared_error,
            series,
        })
    }
}
