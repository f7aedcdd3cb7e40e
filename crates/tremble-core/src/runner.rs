//! The Runner: acquire a workspace, run the command, always clean up.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::RunnerConfig;
use crate::error::RunError;
use crate::executor::{CommandExecutor, OutputSink};
use crate::ids::RunId;
use crate::phase::RunPhase;
use crate::workspace::{WorkspaceGuard, WorkspaceManager};

/// Input to [`Runner::run`].
pub struct RunRequest<'a> {
    /// Repository to clone (URL or local path).
    pub repository: String,

    /// Branch to check out.
    pub branch: String,

    /// Shell command line to run inside the workspace.
    pub command: String,

    /// Explicit workspace path. It is deleted when the run ends, whoever created it.
    pub work_dir: Option<PathBuf>,

    /// Command timeout; `None` or zero means unbounded.
    pub timeout: Option<Duration>,

    /// Receives the command's combined output as it is produced.
    pub output: Option<OutputSink<'a>>,
}

impl<'a> RunRequest<'a> {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            command: command.into(),
            work_dir: None,
            timeout: None,
            output: None,
        }
    }

    /// Use `dir` as the workspace instead of a generated path.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stream the command's output into `sink`.
    pub fn with_output(mut self, sink: OutputSink<'a>) -> Self {
        self.output = Some(sink);
        self
    }
}

impl fmt::Debug for RunRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRequest")
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("command", &self.command)
            .field("work_dir", &self.work_dir)
            .field("timeout", &self.timeout)
            .field("output", &self.output.is_some())
            .finish()
    }
}

/// Result of a run whose command executed to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub run_id: RunId,

    /// Exit code of the command; `-1` if it was killed by a signal.
    pub exit_code: i32,

    /// Signal that terminated the command, if any.
    pub signal: Option<i32>,

    /// Commit the workspace was checked out at.
    pub commit: String,

    /// Where the workspace lived. It no longer exists.
    pub workspace: PathBuf,

    /// Wall time including clone and cleanup.
    pub duration: Duration,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Clones a branch into a private workspace, runs a command there and removes
/// the workspace afterwards, on every exit path.
///
/// A Runner holds no per-run state; one instance can serve any number of
/// concurrent runs.
#[derive(Debug, Clone)]
pub struct Runner {
    workspaces: WorkspaceManager,
    executor: CommandExecutor,
    workspace_root: PathBuf,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            workspaces: WorkspaceManager::new(config.git_path),
            executor: CommandExecutor::new(config.shell, config.shell_flag)
                .with_drain_grace(config.drain_grace),
            workspace_root: config.workspace_root,
        }
    }

    /// Run `request` to completion.
    ///
    /// Returns the exit code if the command ran, otherwise the first acquisition
    /// or execution error. The workspace is removed before this returns; if the
    /// future is dropped early it is removed on drop instead.
    pub async fn run(&self, request: RunRequest<'_>) -> Result<RunResult, RunError> {
        let run_id = RunId::generate();
        let span = info_span!("run", run_id = %run_id);
        self.run_with_id(run_id, request).instrument(span).await
    }

    async fn run_with_id(
        &self,
        run_id: RunId,
        request: RunRequest<'_>,
    ) -> Result<RunResult, RunError> {
        let started = Instant::now();
        let RunRequest {
            repository,
            branch,
            command,
            work_dir,
            timeout,
            output,
        } = request;

        let mut phase = RunPhase::Start;
        let path = self.workspace_path(work_dir, &run_id);
        let mut guard = WorkspaceGuard::new(&path);

        info!(
            repository = %repository,
            branch = %branch,
            workspace = %path.display(),
            "Run started"
        );

        let outcome = async {
            enter(&mut phase, RunPhase::Acquiring);
            let workspace = match self.workspaces.acquire(&repository, &branch, &path).await {
                Ok(workspace) => workspace,
                Err(e) => {
                    enter(&mut phase, RunPhase::Error);
                    warn!(error = %e, "Workspace acquisition failed");
                    return Err(RunError::from(e));
                }
            };

            enter(&mut phase, RunPhase::Running);
            match self.executor.run(&command, &path, timeout, output).await {
                Ok(exit) => Ok((workspace.commit, exit)),
                Err(e) => {
                    enter(&mut phase, RunPhase::Error);
                    warn!(error = %e, "Command execution failed");
                    Err(RunError::from(e))
                }
            }
        }
        .await;

        enter(&mut phase, RunPhase::Cleaning);
        let released = self.workspaces.release(&path).await;
        guard.disarm();
        if let Err(e) = released {
            error!(workspace = %path.display(), error = %e, "Failed to remove workspace");
        }
        enter(&mut phase, RunPhase::Done);

        let (commit, exit) = outcome?;
        let result = RunResult {
            run_id,
            exit_code: exit.exit_code,
            signal: exit.signal,
            commit,
            workspace: path,
            duration: started.elapsed(),
        };

        info!(
            exit_code = result.exit_code,
            duration = ?result.duration,
            "Run finished"
        );
        Ok(result)
    }

    fn workspace_path(&self, work_dir: Option<PathBuf>, run_id: &RunId) -> PathBuf {
        let path = work_dir.unwrap_or_else(|| self.workspace_root.join(run_id.as_str()));
        std::path::absolute(&path).unwrap_or(path)
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

fn enter(phase: &mut RunPhase, next: RunPhase) {
    debug_assert!(phase.can_transition_to(next), "{phase} -> {next}");
    debug!(from = %phase, to = %next, "Run phase");
    *phase = next;
}
