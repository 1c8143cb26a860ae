//! JSON envelope shared by the form endpoints.
//!
//! Success bodies are `{ "data": ..., "meta": ... }`, failures are
//! `{ "error": { "code", "message" }, "meta": ... }`. A [`FormOutcome`]
//! converts straight into a response, so the form page reads the dialog
//! title and message from one shape whichever way the submission went.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::form::FormOutcome;
use crate::types::MaintenanceLabel;

const ENVELOPE_VERSION: &str = "1";

#[derive(Debug, Serialize)]
pub struct Meta {
    pub timestamp: String,
    pub version: &'static str,
}

impl Meta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: ENVELOPE_VERSION,
        }
    }
}

#[derive(Debug, Serialize)]
struct DataBody<T> {
    data: T,
    meta: Meta,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
    meta: Meta,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: &'static str,
    message: &'a str,
}

/// `200` with `payload` under `data`.
pub fn ok<T: Serialize>(payload: T) -> Response {
    (
        StatusCode::OK,
        Json(DataBody {
            data: payload,
            meta: Meta::now(),
        }),
    )
        .into_response()
}

/// Every failure the API reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Body was not a JSON form submission.
    BadRequest(String),
    NotFound(String),
    /// A form field did not parse; the model was not called.
    InvalidInput(String),
    /// The loaded model could not score the submission.
    Model(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Model(_) => "MODEL_ERROR",
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::NotFound(m)
            | ApiError::InvalidInput(m)
            | ApiError::Model(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.message(),
            },
            meta: Meta::now(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// `data` of a successful `POST /api/v1/predict`.
#[derive(Debug, Serialize)]
pub struct PredictionBody {
    pub title: &'static str,
    pub message: String,
    pub label: MaintenanceLabel,
    pub score: f64,
}

impl IntoResponse for FormOutcome {
    fn into_response(self) -> Response {
        let title = self.title();
        let message = self.message();
        match self {
            FormOutcome::Prediction { prediction } => ok(PredictionBody {
                title,
                message,
                label: prediction.label,
                score: prediction.score,
            }),
            FormOutcome::InputError { .. } => ApiError::InvalidInput(message).into_response(),
            FormOutcome::ModelError { .. } => ApiError::Model(message).into_response(),
        }
    }
}
