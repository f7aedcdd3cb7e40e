//! Tremble Server
//!
//! HTTP front end for `tremble-core`: receives gitlab webhooks, runs the
//! configured command against the pushed branch, and keeps an append-only
//! history rendered as an HTML page.

pub mod config;
pub mod history;
pub mod http;
pub mod payload;
pub mod state;

pub use config::Config;
pub use history::{ErrorEntry, HistoryEntry, JsonLog, LogError, Outcome};
pub use http::create_router;
pub use payload::{GitlabEvent, PayloadError, Trigger};
pub use state::AppState;
