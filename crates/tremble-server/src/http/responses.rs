//! HTTP response types.

use serde::Serialize;

use crate::history::Outcome;

/// Message returned for any trigger that could not be processed.
pub const TRIGGER_ERROR_MESSAGE: &str = "Server error or bad request.";

/// Response body for a processed trigger.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub result: Outcome,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
