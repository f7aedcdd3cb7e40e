//! History page handler.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::history::HistoryEntry;
use crate::http::render::render_history;
use crate::state::AppState;

/// Render `tests.log` as an HTML page, in log order.
pub async fn history_page(State(state): State<Arc<AppState>>) -> Response {
    match state.history.read_all::<HistoryEntry>().await {
        Ok(entries) => Html(render_history(&state.config.title(), &entries)).into_response(),
        Err(e) => {
            error!(error = %e, log = %state.history.path().display(), "Failed to read history");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read history").into_response()
        }
    }
}
