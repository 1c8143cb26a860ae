//! Form submission end to end with substitute models.
//!
//! Covers the full path a Predict press takes: raw strings → encoder →
//! N×1×6 batch → model → threshold → dialog text.

use std::sync::{Arc, Mutex};

use predmaint::features::FormInput;
use predmaint::form::{submit, FormOutcome};
use predmaint::inference::{InferenceAdapter, Model, ModelError, SequenceBatch};
use predmaint::MaintenanceLabel;

/// Fixed-score model that records every batch it receives.
struct ScriptedModel {
    score: f64,
    seen: Mutex<Vec<SequenceBatch>>,
}

impl ScriptedModel {
    fn new(score: f64) -> Arc<Self> {
        Arc::new(Self {
            score,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Model for ScriptedModel {
    fn input_width(&self) -> usize {
        6
    }

    fn predict(&self, batch: &SequenceBatch) -> Result<Vec<f64>, ModelError> {
        self.seen.lock().unwrap().push(batch.clone());
        Ok(vec![self.score; batch.rows()])
    }
}

fn form(values: [&str; 6]) -> FormInput {
    FormInput {
        machine_type: values[0].into(),
        air_temperature: values[1].into(),
        process_temperature: values[2].into(),
        rotational_speed: values[3].into(),
        torque: values[4].into(),
        tool_wear: values[5].into(),
    }
}

#[test]
fn low_machine_high_score_reports_failure() {
    let model = ScriptedModel::new(0.9);
    let adapter = InferenceAdapter::new(model.clone());

    let outcome = submit(&form(["L", "300", "310", "1500", "40", "10"]), &adapter);

    assert_eq!(outcome.title(), "Prediction Result");
    assert_eq!(outcome.message(), "Prediction: Failure");

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].shape(), (1, 1, 6));
    assert_eq!(seen[0].as_slice(), &[0.0, 300.0, 310.0, 1500.0, 40.0, 10.0]);
}

#[test]
fn medium_machine_low_score_reports_normal() {
    let model = ScriptedModel::new(0.2);
    let adapter = InferenceAdapter::new(model.clone());

    let outcome = submit(&form(["M", "298", "308", "1400", "35", "5"]), &adapter);

    assert_eq!(outcome.message(), "Prediction: Normal");
    assert_eq!(outcome.prediction().map(|p| p.label), Some(MaintenanceLabel::Normal));
    assert_eq!(model.seen.lock().unwrap()[0].as_slice()[0], 1.0);
}

#[test]
fn unknown_machine_type_never_reaches_model() {
    let model = ScriptedModel::new(0.9);
    let adapter = InferenceAdapter::new(model.clone());

    let outcome = submit(&form(["X", "300", "310", "1500", "40", "10"]), &adapter);

    assert!(matches!(outcome, FormOutcome::InputError { .. }));
    assert_eq!(outcome.title(), "Error");
    assert!(outcome.message().contains("\"X\""), "{}", outcome.message());
    assert_eq!(model.calls(), 0);
}

#[test]
fn any_non_numeric_field_never_reaches_model() {
    let model = ScriptedModel::new(0.9);
    let adapter = InferenceAdapter::new(model.clone());
    let good = ["H", "300", "310", "1500", "40", "10"];

    for field in 1..6 {
        let mut values = good;
        values[field] = "n/a";
        let outcome = submit(&form(values), &adapter);
        assert!(matches!(outcome, FormOutcome::InputError { .. }), "field {field}");
    }
    assert_eq!(model.calls(), 0);
}

#[test]
fn threshold_boundaries() {
    let cases = [
        (0.5, "Prediction: Normal"),
        (0.50001, "Prediction: Failure"),
        (0.49999, "Prediction: Normal"),
    ];
    for (score, expected) in cases {
        let adapter = InferenceAdapter::new(ScriptedModel::new(score));
        let outcome = submit(&form(["L", "300", "310", "1500", "40", "10"]), &adapter);
        assert_eq!(outcome.message(), expected, "score {score}");
    }
}

#[test]
fn batch_rows_keep_order() {
    let model = ScriptedModel::new(0.1);
    let adapter = InferenceAdapter::new(model.clone());
    let rows: Vec<[f64; 6]> = (0..4).map(|i| [i as f64; 6]).collect();

    let labels = adapter.predict_labels(&rows).unwrap();

    assert_eq!(labels, vec![MaintenanceLabel::Normal; 4]);
    let seen = model.seen.lock().unwrap();
    assert_eq!(seen[0].shape(), (4, 1, 6));
    for (i, seq) in seen[0].sequences().enumerate() {
        assert_eq!(seq, &[i as f64; 6]);
    }
}
