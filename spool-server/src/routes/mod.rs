//! HTTP routes
//!
//! Thin glue over the queue: handlers enqueue and read snapshots, never
//! block on the worker.

pub mod health;
pub mod print;

use crate::state::AppState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Maximum upload size (20MB)
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/print", post(print::submit))
        .route("/queue", get(health::queue_status))
        .route("/health", get(health::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
