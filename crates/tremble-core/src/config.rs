//! Runner configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Path to the git executable.
    pub git_path: String,

    /// Shell used to interpret the command line.
    pub shell: String,

    /// Flag that makes `shell` read the command from its next argument.
    pub shell_flag: String,

    /// Parent directory for generated workspaces.
    pub workspace_root: PathBuf,

    /// How long to keep reading output after the command exits, for
    /// background processes that still hold the pipes open.
    pub drain_grace: Duration,
}

impl RunnerConfig {
    /// Default configuration with generated workspaces under `root`.
    pub fn with_workspace_root(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: root.into(),
            ..Self::default()
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let (shell, shell_flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
        Self {
            git_path: "git".to_string(),
            shell: shell.to_string(),
            shell_flag: shell_flag.to_string(),
            workspace_root: std::env::temp_dir().join("tremble"),
            drain_grace: Duration::from_secs(2),
        }
    }
}
