//! API handlers for the prediction form.
//!
//! Inference runs inline in the handler; the model is immutable after load
//! so the shared adapter needs no lock.

use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::envelope::{self, ApiError};
use crate::features::{FormInput, FORM_FEATURE_WIDTH};
use crate::form::submit;
use crate::inference::InferenceAdapter;
use crate::types::MachineType;

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub adapter: InferenceAdapter,
    /// Where the loaded artifact came from, if it came from disk
    pub artifact_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(adapter: InferenceAdapter) -> Self {
        Self {
            adapter,
            artifact_path: None,
        }
    }

    #[must_use]
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    /// Whether the loaded model takes the form's feature vector.
    pub fn form_compatible(&self) -> bool {
        self.adapter.input_width() == FORM_FEATURE_WIDTH
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub form_compatible: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub artifact_path: Option<String>,
    pub input_width: usize,
    pub timesteps: usize,
    pub feature_names: Vec<String>,
    pub form_compatible: bool,
    pub machine_types: Vec<&'static str>,
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /api/v1/predict`: score one form submission.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<FormInput>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(body) => body,
        Err(rejection) => return ApiError::BadRequest(rejection.body_text()).into_response(),
    };

    submit(&input, &state.adapter).into_response()
}

/// `GET /api/v1/health`
pub async fn health(State(state): State<AppState>) -> Response {
    envelope::ok(HealthResponse {
        status: "ok",
        model_loaded: true,
        form_compatible: state.form_compatible(),
    })
}

/// `GET /api/v1/model`: what the loaded model expects.
pub async fn model_info(State(state): State<AppState>) -> Response {
    let model = state.adapter.model();
    envelope::ok(ModelInfoResponse {
        artifact_path: state.artifact_path.as_ref().map(|p| p.display().to_string()),
        input_width: model.input_width(),
        timesteps: model.timesteps(),
        feature_names: model.feature_names(),
        form_compatible: state.form_compatible(),
        machine_types: MachineType::ALL.iter().map(|t| t.label()).collect(),
    })
}
