//! Workspace acquisition and release.
//!
//! A workspace is a directory holding a fresh clone of the repository with the
//! requested branch force-checked-out. It is created by [`WorkspaceManager::acquire`]
//! and destroyed by [`WorkspaceManager::release`]; [`WorkspaceGuard`] covers the
//! paths where the async release never gets to run (cancellation, panics).

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{AcquisitionError, ReleaseError};

/// A checked-out copy of a repository at a branch tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Root of the working tree.
    pub path: PathBuf,

    /// Branch that was checked out.
    pub branch: String,

    /// Full commit hash the working tree was forced to.
    pub commit: String,
}

/// Clones repositories into workspaces and removes them again.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    git_path: String,
}

impl WorkspaceManager {
    /// Create a manager that drives the git executable at `git_path`.
    pub fn new(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    /// Clone `repository` into `target` and force its working tree to the tip of `branch`.
    ///
    /// `target` and its parents are created if absent. On failure `target` may be
    /// left partially populated; callers are expected to [`release`](Self::release) it.
    pub async fn acquire(
        &self,
        repository: &str,
        branch: &str,
        target: &Path,
    ) -> Result<Workspace, AcquisitionError> {
        info!(
            repository = %repository,
            branch = %branch,
            workspace = %target.display(),
            "Acquiring workspace"
        );

        tokio::fs::create_dir_all(target)
            .await
            .map_err(|source| AcquisitionError::Filesystem {
                path: target.to_path_buf(),
                source,
            })?;

        // Clone without checkout; the branch is resolved and checked out explicitly
        // below so a missing branch can be told apart from an unreachable remote.
        let clone = self
            .git(
                None,
                [
                    OsStr::new("clone"),
                    OsStr::new("--quiet"),
                    OsStr::new("--no-checkout"),
                    OsStr::new("--"),
                    OsStr::new(repository),
                    target.as_os_str(),
                ],
            )
            .await?;
        if !clone.status.success() {
            return Err(AcquisitionError::Clone {
                repository: repository.to_string(),
                stderr: stderr_text(&clone),
            });
        }

        let commit = self
            .resolve_branch(target, branch)
            .await?
            .ok_or_else(|| AcquisitionError::BranchNotFound {
                repository: repository.to_string(),
                branch: branch.to_string(),
            })?;
        debug!(branch = %branch, commit = %commit, "Resolved branch");

        let checkout = self
            .git(
                Some(target),
                [
                    OsStr::new("checkout"),
                    OsStr::new("--quiet"),
                    OsStr::new("--force"),
                    OsStr::new("-B"),
                    OsStr::new(branch),
                    OsStr::new(&commit),
                ],
            )
            .await?;
        if !checkout.status.success() {
            return Err(AcquisitionError::Checkout {
                branch: branch.to_string(),
                stderr: stderr_text(&checkout),
            });
        }

        info!(commit = %commit, workspace = %target.display(), "Workspace ready");

        Ok(Workspace {
            path: target.to_path_buf(),
            branch: branch.to_string(),
            commit,
        })
    }

    /// Recursively remove `target`.
    ///
    /// The path is taken literally: nothing is expanded, and a symlink at `target`
    /// is removed without touching what it points to. A missing path is not an error.
    pub async fn release(&self, target: &Path) -> Result<(), ReleaseError> {
        remove_tree(target).await.map_err(|source| ReleaseError {
            path: target.to_path_buf(),
            source,
        })?;
        debug!(workspace = %target.display(), "Workspace removed");
        Ok(())
    }

    /// Resolve `branch` on the cloned remote to a commit hash.
    ///
    /// Returns `Ok(None)` when the remote has no such branch.
    async fn resolve_branch(
        &self,
        repo: &Path,
        branch: &str,
    ) -> Result<Option<String>, AcquisitionError> {
        let rev = format!("refs/remotes/origin/{branch}^{{commit}}");
        let output = self
            .git(
                Some(repo),
                [
                    OsStr::new("rev-parse"),
                    OsStr::new("--verify"),
                    OsStr::new("--quiet"),
                    OsStr::new(&rev),
                ],
            )
            .await?;

        if !output.status.success() {
            return Ok(None);
        }

        let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!commit.is_empty()).then_some(commit))
    }

    /// Run git to completion, capturing its output.
    async fn git<'a, I>(&self, cwd: Option<&Path>, args: I) -> Result<Output, AcquisitionError>
    where
        I: IntoIterator<Item = &'a OsStr>,
    {
        let mut cmd = Command::new(&self.git_path);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!("Running git: {:?}", cmd);

        cmd.output()
            .await
            .map_err(|source| AcquisitionError::GitUnavailable {
                git: self.git_path.clone(),
                source,
            })
    }
}

impl Default for WorkspaceManager {
    fn default() -> Self {
        Self::new("git")
    }
}

fn stderr_text(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if text.is_empty() {
        format!("git exited with {}", output.status)
    } else {
        text
    }
}

async fn remove_tree(target: &Path) -> io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(target).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(target).await
    } else {
        tokio::fs::remove_file(target).await
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_tree_blocking(target: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        std::fs::remove_dir_all(target)
    } else {
        std::fs::remove_file(target)
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Removes a workspace when dropped unless it was disarmed first.
///
/// The Runner disarms it right before its own async release, so the guard only
/// fires when the run future is dropped mid-flight or unwinds.
#[derive(Debug)]
pub struct WorkspaceGuard {
    path: Option<PathBuf>,
}

impl WorkspaceGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Hand responsibility for removal back to the caller.
    pub fn disarm(&mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            warn!(workspace = %path.display(), "Run abandoned, removing workspace");
            if let Err(e) = remove_tree_blocking(&path) {
                tracing::error!(
                    workspace = %path.display(),
                    error = %e,
                    "Failed to remove abandoned workspace"
                );
            }
        }
    }
}
