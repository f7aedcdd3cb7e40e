//! HTTP request handlers.

mod health;
mod history;
mod trigger;

pub use health::health_check;
pub use history::history_page;
pub use trigger::trigger_gitlab;
