//! REST API module using Axum
//!
//! Serves the prediction form and its JSON endpoints:
//! - `GET /` form page, embedded via `rust-embed`
//! - `POST /api/v1/predict` score one form submission
//! - `GET /api/v1/health`, `GET /api/v1/model`

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use rust_embed::Embed;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use envelope::ApiError;

/// Form submissions are six short strings.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Form page assets compiled from `static/`.
#[derive(Embed)]
#[folder = "static/"]
struct FormAssets;

/// Serve a static asset; `/` maps to `index.html`.
async fn serve_asset(uri: Uri) -> Response {
    let path = match uri.path().trim_start_matches('/') {
        "" => "index.html",
        p => p,
    };

    if let Some(content) = FormAssets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime.as_ref())],
            content.data.into_owned(),
        )
            .into_response();
    }

    ApiError::NotFound(format!("no such resource: /{path}")).into_response()
}

/// Create the complete application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state))
        .fallback(serve_asset)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
}
