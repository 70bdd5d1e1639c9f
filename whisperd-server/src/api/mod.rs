//! HTTP API surface

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod transcriptions;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/audio/transcriptions", post(transcriptions::transcribe))
        .with_state(state)
        .merge(health_router())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Routes that do not need a transcription session.
pub fn health_router() -> Router {
    Router::new().route("/healthz", get(health))
}

async fn health() -> &'static str {
    "ok"
}
