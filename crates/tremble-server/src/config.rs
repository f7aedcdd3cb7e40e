//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `tests.log`, `error.log` and the `tmp/` workspaces.
    pub data_dir: PathBuf,

    /// Command run against every triggered branch.
    pub command: String,

    /// Title of the history page.
    pub page_title: Option<String>,

    /// HTTP bind address.
    pub bind_addr: String,

    /// Per-run command timeout. `None` means unbounded.
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            command: command.into(),
            ..Self::default()
        }
    }

    /// Append-only history of finished runs.
    pub fn tests_log_path(&self) -> PathBuf {
        self.data_dir.join("tests.log")
    }

    /// Append-only log of triggers that failed before producing a result.
    pub fn error_log_path(&self) -> PathBuf {
        self.data_dir.join("error.log")
    }

    /// Parent directory of per-run workspaces.
    pub fn workspace_root(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    /// Configured page title, or `Tremble v<version>`.
    pub fn title(&self) -> String {
        self.page_title
            .clone()
            .unwrap_or_else(|| format!("Tremble v{}", env!("CARGO_PKG_VERSION")))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            command: "make test".to_string(),
            page_title: None,
            bind_addr: "127.0.0.1:8080".to_string(),
            timeout: None,
        }
    }
}
