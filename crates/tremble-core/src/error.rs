//! Error types for workspace acquisition, command execution and cleanup.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while preparing a workspace (clone + checkout).
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The workspace directory could not be created or written.
    #[error("failed to prepare workspace '{}': {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The git executable could not be launched.
    #[error("failed to launch git '{git}': {source}")]
    GitUnavailable {
        git: String,
        #[source]
        source: io::Error,
    },

    /// Cloning failed (unreachable or invalid repository).
    #[error("failed to clone '{repository}': {stderr}")]
    Clone { repository: String, stderr: String },

    /// The requested branch does not exist in the repository.
    #[error("branch '{branch}' not found in '{repository}'")]
    BranchNotFound { repository: String, branch: String },

    /// Forcing the working tree to the branch commit failed.
    #[error("failed to check out '{branch}': {stderr}")]
    Checkout { branch: String, stderr: String },
}

/// Errors raised while running the command.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The shell could not be launched (missing shell, invalid cwd).
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The command outlived its timeout and was killed.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// Waiting on the child process failed.
    #[error("failed waiting for command: {0}")]
    Wait(#[source] io::Error),
}

impl ExecutionError {
    /// Returns true if the command started but was killed for exceeding its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// The workspace could not be fully removed.
///
/// Never returned from a run; reported through tracing since it only means
/// leaked disk space.
#[derive(Debug, Error)]
#[error("failed to remove workspace '{}': {source}", .path.display())]
pub struct ReleaseError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// First error hit by a run, surfaced after cleanup.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl RunError {
    /// Returns true if the command actually ran before failing (timeout).
    pub fn command_started(&self) -> bool {
        matches!(self, Self::Execution(e) if e.is_timeout())
    }
}
