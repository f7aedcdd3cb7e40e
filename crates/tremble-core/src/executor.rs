//! Command execution inside a workspace.
//!
//! The command is handed to the platform shell with the workspace as its
//! working directory. Both output pipes are read by a single loop and written
//! to the caller's sink in the order chunks arrive; when there is no sink the
//! pipes are still drained so the child never blocks on a full buffer.

use std::future::Future;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ExecutionError;

/// Exit code reported when the process was terminated by a signal.
pub const SIGNALLED_EXIT_CODE: i32 = -1;

const CHUNK_SIZE: usize = 8192;

/// Destination for the command's combined stdout/stderr bytes.
pub type OutputSink<'a> = &'a mut (dyn AsyncWrite + Send + Unpin);

/// How a command that ran to completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Process exit code, or [`SIGNALLED_EXIT_CODE`] if killed by a signal.
    pub exit_code: i32,

    /// Signal that terminated the process, if any.
    pub signal: Option<i32>,

    /// Bytes of output read from the pipes.
    pub output_bytes: u64,
}

impl ExitOutcome {
    fn from_status(status: ExitStatus, output_bytes: u64) -> Self {
        match status.code() {
            Some(exit_code) => Self {
                exit_code,
                signal: None,
                output_bytes,
            },
            None => Self {
                exit_code: SIGNALLED_EXIT_CODE,
                signal: termination_signal(status),
                output_bytes,
            },
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(unix)]
fn termination_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Runs shell command lines in a given directory.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
    shell_flag: String,
    drain_grace: Duration,
}

impl CommandExecutor {
    /// Create an executor that runs commands as `<shell> <shell_flag> <command>`.
    pub fn new(shell: impl Into<String>, shell_flag: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            shell_flag: shell_flag.into(),
            drain_grace: Duration::from_secs(2),
        }
    }

    /// Set how long to keep draining output after the command has exited.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Run `command` in `cwd` and wait for it to finish.
    ///
    /// A `timeout` of `None` or zero means no limit. If the command has not exited
    /// when it elapses, the whole process group is killed and
    /// [`ExecutionError::Timeout`] is returned.
    pub async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Option<Duration>,
        sink: Option<OutputSink<'_>>,
    ) -> Result<ExitOutcome, ExecutionError> {
        let timeout = timeout.filter(|limit| !limit.is_zero());

        info!(
            cwd = %cwd.display(),
            timeout = ?timeout,
            streaming = sink.is_some(),
            "Starting command"
        );

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.shell_flag)
            .arg(command)
            .current_dir(cwd)
            .env("PWD", cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down everything the command started.
        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Full command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let mut group = ProcessGroup::new(child.id());

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(ExecutionError::Wait(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "child output pipes unavailable",
            )));
        };

        let deadline = timeout.map(|limit| Instant::now() + limit);
        let supervised = supervise(
            &mut child,
            forward_output(stdout, stderr, sink),
            self.drain_grace,
            deadline,
        )
        .await
        .map_err(ExecutionError::Wait)?;

        let Some((status, output_bytes)) = supervised else {
            let limit = timeout.unwrap_or_default();
            warn!(timeout = ?limit, "Command timed out, killing");
            group.kill();
            let _ = child.kill().await;
            return Err(ExecutionError::Timeout(limit));
        };

        // Anything the command left running in the background goes with it.
        group.kill();

        let outcome = ExitOutcome::from_status(status, output_bytes);
        info!(
            exit_code = outcome.exit_code,
            signal = outcome.signal,
            output_bytes = outcome.output_bytes,
            "Command exited"
        );
        Ok(outcome)
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        if cfg!(windows) {
            Self::new("cmd", "/C")
        } else {
            Self::new("sh", "-c")
        }
    }
}

/// Wait for `child` while `pump` moves its output.
///
/// Returns `None` if `deadline` passes before the child exits. Once the child
/// has exited the deadline no longer applies, and the pump gets `grace` to
/// reach EOF on both pipes.
async fn supervise<P>(
    child: &mut Child,
    pump: P,
    grace: Duration,
    deadline: Option<Instant>,
) -> io::Result<Option<(ExitStatus, u64)>>
where
    P: Future<Output = io::Result<u64>>,
{
    tokio::pin!(pump);
    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(expired);
    let mut forwarded = None;

    let status = loop {
        tokio::select! {
            biased;
            status = child.wait() => break status?,
            result = &mut pump, if forwarded.is_none() => {
                forwarded = Some(result.unwrap_or_else(|e| {
                    warn!(error = %e, "Error reading command output");
                    0
                }));
            }
            _ = &mut expired => return Ok(None),
        }
    };

    let output_bytes = match forwarded {
        Some(bytes) => bytes,
        None => match tokio::time::timeout(grace, &mut pump).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!(error = %e, "Error reading command output");
                0
            }
            Err(_) => {
                debug!("Output pipes still open after exit, abandoning them");
                0
            }
        },
    };

    Ok(Some((status, output_bytes)))
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Copy both pipes into `sink` until EOF, in arrival order.
///
/// Returns the number of bytes read. If the sink fails, the error is logged and
/// the pipes are drained without forwarding.
async fn forward_output<O, E>(
    mut stdout: O,
    mut stderr: E,
    mut sink: Option<OutputSink<'_>>,
) -> io::Result<u64>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = vec![0u8; CHUNK_SIZE];
    let mut err_buf = vec![0u8; CHUNK_SIZE];
    let mut out_open = true;
    let mut err_open = true;
    let mut total = 0u64;

    while out_open || err_open {
        let (stream, n) = tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => (Stream::Stdout, read?),
            read = stderr.read(&mut err_buf), if err_open => (Stream::Stderr, read?),
            else => break,
        };

        if n == 0 {
            match stream {
                Stream::Stdout => out_open = false,
                Stream::Stderr => err_open = false,
            }
            continue;
        }

        total += n as u64;
        let chunk = match stream {
            Stream::Stdout => &out_buf[..n],
            Stream::Stderr => &err_buf[..n],
        };

        if let Some(writer) = sink.as_deref_mut() {
            let written = async {
                writer.write_all(chunk).await?;
                writer.flush().await
            }
            .await;
            if let Err(e) = written {
                warn!(error = %e, "Output sink failed, discarding further output");
                sink = None;
            }
        }
    }

    Ok(total)
}

/// Process group of a spawned command, killed on demand or on drop.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    #[cfg(unix)]
    fn kill(&mut self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pgid) = self.pgid.take() {
            // ESRCH just means every member is already gone.
            if let Err(e) = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                if e != nix::errno::Errno::ESRCH {
                    warn!(pgid, error = %e, "Failed to kill process group");
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn kill(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
