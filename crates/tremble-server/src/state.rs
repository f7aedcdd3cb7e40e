//! Shared application state.

use std::sync::Arc;

use tremble_core::{Runner, RunnerConfig};

use crate::config::Config;
use crate::history::JsonLog;

/// Shared application state.
pub struct AppState {
    pub config: Config,

    /// Runs triggered builds in workspaces under `<data_dir>/tmp`.
    pub runner: Runner,

    /// `tests.log`: one entry per finished run.
    pub history: JsonLog,

    /// `error.log`: triggers that failed before producing a result.
    pub errors: JsonLog,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(config: Config) -> Arc<Self> {
        let runner = Runner::new(RunnerConfig::with_workspace_root(config.workspace_root()));
        Self::with_runner(config, runner)
    }

    /// Create state around an already configured runner.
    pub fn with_runner(config: Config, runner: Runner) -> Arc<Self> {
        Arc::new(Self {
            history: JsonLog::new(config.tests_log_path()),
            errors: JsonLog::new(config.error_log_path()),
            runner,
            config,
        })
    }
}
