//! Gitlab trigger handler.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, info, warn};
use tremble_core::{RunError, RunRequest};

use crate::history::{ErrorEntry, HistoryEntry, LogError, Outcome};
use crate::http::responses::{ErrorResponse, TriggerResponse, TRIGGER_ERROR_MESSAGE};
use crate::payload::{GitlabEvent, PayloadError};
use crate::state::AppState;

/// Why a trigger produced no result.
#[derive(Debug, Error)]
enum TriggerError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("Failed to record history: {0}")]
    History(#[from] LogError),
}

/// Run the configured command against the branch named by a gitlab webhook.
///
/// A command that ran answers `200` with `success` or `failure`. Anything that
/// kept it from running answers `500` and is written to the error log.
pub async fn trigger_gitlab(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match handle_trigger(&state, &body).await {
        Ok(result) => (StatusCode::OK, Json(TriggerResponse { result })).into_response(),
        Err(e) => {
            error!(error = %e, "Trigger failed");
            if let Err(log_err) = state.errors.append(&ErrorEntry::new(e.to_string(), &body)).await {
                error!(error = %log_err, "Failed to write error log");
            }
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: TRIGGER_ERROR_MESSAGE.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn handle_trigger(state: &AppState, body: &[u8]) -> Result<Outcome, TriggerError> {
    let trigger = GitlabEvent::parse(body)?.into_trigger()?;

    info!(
        repository = %trigger.repository,
        branch = %trigger.branch,
        commit = %trigger.commit.id,
        "Trigger received"
    );

    let mut stdout: Vec<u8> = Vec::new();
    let mut request = RunRequest::new(
        trigger.repository.clone(),
        trigger.branch.clone(),
        state.config.command.clone(),
    )
    .with_output(&mut stdout);
    if let Some(timeout) = state.config.timeout {
        request = request.with_timeout(timeout);
    }

    let run = state.runner.run(request).await;
    let (result, exit_code) = match run {
        Ok(run) if run.is_success() => (Outcome::Success, Some(run.exit_code)),
        Ok(run) => (Outcome::Failure, Some(run.exit_code)),
        // The command ran and was stopped; that is a failing test, not a bad trigger.
        Err(e) if e.command_started() => {
            warn!(error = %e, "Command did not finish");
            (Outcome::Failure, None)
        }
        Err(e) => return Err(e.into()),
    };

    let entry = HistoryEntry::new(
        result,
        &trigger,
        String::from_utf8_lossy(&stdout).into_owned(),
        exit_code,
    );
    state.history.append(&entry).await?;

    info!(result = result.label(), "Trigger recorded");
    Ok(result)
}
