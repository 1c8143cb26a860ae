//! Prediction types: the maintenance label and the decision threshold

use serde::{Deserialize, Serialize};

/// Scores strictly above this value are labelled `Failure`.
pub const FAILURE_THRESHOLD: f64 = 0.5;

/// Binary maintenance verdict produced from a model score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MaintenanceLabel {
    Failure,
    Normal,
}

impl MaintenanceLabel {
    /// Binarize a model score. Exactly `FAILURE_THRESHOLD` is `Normal`.
    pub fn from_score(score: f64) -> Self {
        if score > FAILURE_THRESHOLD {
            MaintenanceLabel::Failure
        } else {
            MaintenanceLabel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceLabel::Failure => "Failure",
            MaintenanceLabel::Normal => "Normal",
        }
    }
}

impl std::fmt::Display for MaintenanceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored row: the raw model output and its label.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Prediction {
    pub score: f64,
    pub label: MaintenanceLabel,
}

impl Prediction {
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            label: MaintenanceLabel::from_score(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(MaintenanceLabel::from_score(0.5), MaintenanceLabel::Normal);
        assert_eq!(MaintenanceLabel::from_score(0.50001), MaintenanceLabel::Failure);
        assert_eq!(MaintenanceLabel::from_score(0.49999), MaintenanceLabel::Normal);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(MaintenanceLabel::from_score(0.0), MaintenanceLabel::Normal);
        assert_eq!(MaintenanceLabel::from_score(1.0), MaintenanceLabel::Failure);
    }

    #[test]
    fn test_display_matches_label_set() {
        assert_eq!(MaintenanceLabel::Failure.to_string(), "Failure");
        assert_eq!(MaintenanceLabel::Normal.to_string(), "Normal");
    }

    #[test]
    fn test_prediction_keeps_score() {
        let p = Prediction::from_score(0.9);
        assert_eq!(p.label, MaintenanceLabel::Failure);
        assert!((p.score - 0.9).abs() < f64::EPSILON);
    }
}
