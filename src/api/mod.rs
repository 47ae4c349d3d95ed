//! HTTP interface to the job manager

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;

/// Build the application router.
///
/// Bodies above the configured upload limit are rejected with 413 before
/// they reach the manager.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.jobs.settings().max_upload.as_bytes()).unwrap_or(usize::MAX);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::jobs::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
