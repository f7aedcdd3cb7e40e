//! HTTP server.
//!
//! Provides endpoints for:
//! - Gitlab webhooks (`/trigger/gitlab`)
//! - Test history page (`/`)
//! - Health check (`/health`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod render;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::history_page))
        .route("/trigger/gitlab", post(handlers::trigger_gitlab))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
