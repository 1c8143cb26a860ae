//! v1 API route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppState};

/// Build the v1 API router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(handlers::predict))
        .route("/health", get(handlers::health))
        .route("/model", get(handlers::model_info))
        .with_state(state)
}
