//! Newtype wrapper for run identifiers.

use std::fmt;
use uuid::Uuid;

/// Unique identifier for a single Runner invocation.
///
/// Generated workspaces are named after it, so two invocations never share a
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// A fresh v4 UUID in hyphenated form.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
