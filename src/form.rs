//! Form submission: the one operation behind the Predict button.
//!
//! Encodes the form, runs the model on a single-row batch and turns the
//! result (or the failure) into the title and message shown to the user.
//! Input errors are caught before the model is touched.

use serde::Serialize;
use tracing::{info, warn};

use crate::features::{encode, FormInput, InputError};
use crate::inference::{InferenceAdapter, ModelError};
use crate::types::Prediction;

/// What the user sees after pressing Predict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormOutcome {
    Prediction { prediction: Prediction },
    InputError { message: String },
    ModelError { message: String },
}

impl FormOutcome {
    /// Dialog title.
    pub fn title(&self) -> &'static str {
        match self {
            FormOutcome::Prediction { .. } => "Prediction Result",
            FormOutcome::InputError { .. } | FormOutcome::ModelError { .. } => "Error",
        }
    }

    /// Dialog body.
    pub fn message(&self) -> String {
        match self {
            FormOutcome::Prediction { prediction } => format!("Prediction: {}", prediction.label),
            FormOutcome::InputError { message } => format!("Invalid input: {message}"),
            FormOutcome::ModelError { message } => format!("Model error: {message}"),
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, FormOutcome::Prediction { .. })
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            FormOutcome::Prediction { prediction } => Some(prediction),
            _ => None,
        }
    }
}

impl From<InputError> for FormOutcome {
    fn from(e: InputError) -> Self {
        FormOutcome::InputError {
            message: e.to_string(),
        }
    }
}

impl From<ModelError> for FormOutcome {
    fn from(e: ModelError) -> Self {
        FormOutcome::ModelError {
            message: e.to_string(),
        }
    }
}

/// Predict a single row from raw form input.
pub fn predict_form(
    input: &FormInput,
    adapter: &InferenceAdapter,
) -> Result<Prediction, FormError> {
    let features = encode(input)?;
    let predictions = adapter.predict(&[features])?;
    predictions.into_iter().next().ok_or(FormError::Model(ModelError::OutputCount {
        expected: 1,
        actual: 0,
    }))
}

/// Either side of a failed form submission.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Handle one Predict press. Never panics; every failure becomes an
/// error outcome.
pub fn submit(input: &FormInput, adapter: &InferenceAdapter) -> FormOutcome {
    match predict_form(input, adapter) {
        Ok(prediction) => {
            info!(score = prediction.score, label = %prediction.label, "Form prediction");
            FormOutcome::Prediction { prediction }
        }
        Err(FormError::Input(e)) => {
            info!(error = %e, "Rejected form input");
            e.into()
        }
        Err(FormError::Model(e)) => {
            warn!(error = %e, "Model failed on form input");
            e.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{Model, SequenceBatch};
    use crate::types::MaintenanceLabel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ConstModel {
        width: usize,
        score: f64,
        calls: AtomicUsize,
    }

    impl Model for ConstModel {
        fn input_width(&self) -> usize {
            self.width
        }

        fn predict(&self, batch: &SequenceBatch) -> Result<Vec<f64>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.score; batch.rows()])
        }
    }

    fn adapter(width: usize, score: f64) -> (Arc<ConstModel>, InferenceAdapter) {
        let model = Arc::new(ConstModel {
            width,
            score,
            calls: AtomicUsize::new(0),
        });
        (model.clone(), InferenceAdapter::new(model))
    }

    fn form(machine_type: &str, torque: &str) -> FormInput {
        FormInput {
            machine_type: machine_type.into(),
            air_temperature: "300".into(),
            process_temperature: "310".into(),
            rotational_speed: "1500".into(),
            torque: torque.into(),
            tool_wear: "10".into(),
        }
    }

    #[test]
    fn test_prediction_outcome() {
        let (_, adapter) = adapter(6, 0.9);
        let outcome = submit(&form("L", "40"), &adapter);
        assert_eq!(outcome.title(), "Prediction Result");
        assert_eq!(outcome.message(), "Prediction: Failure");
        assert_eq!(outcome.prediction().unwrap().label, MaintenanceLabel::Failure);
        assert!(!outcome.is_error());
    }

    #[test]
    fn test_input_error_skips_model() {
        let (model, adapter) = adapter(6, 0.9);
        let outcome = submit(&form("L", "forty"), &adapter);
        assert!(matches!(outcome, FormOutcome::InputError { .. }));
        assert_eq!(outcome.title(), "Error");
        assert!(outcome.message().contains("torque"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_model_error_outcome() {
        // A 5-wide model cannot take the 6-wide form vector.
        let (model, adapter) = adapter(5, 0.9);
        let outcome = submit(&form("M", "40"), &adapter);
        assert!(matches!(outcome, FormOutcome::ModelError { .. }));
        assert!(outcome.message().starts_with("Model error:"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_outcome_json_shape() {
        let (_, adapter) = adapter(6, 0.2);
        let v = serde_json::to_value(submit(&form("H", "40"), &adapter)).unwrap();
        assert_eq!(v["kind"], "prediction");
        assert_eq!(v["prediction"]["label"], "Normal");
    }
}
