//! Throwaway git repositories for tests.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// A local repository with two branches:
/// `master` and `remote_test`, each with a `branch.txt` naming itself.
pub(crate) struct FixtureRepo {
    dir: TempDir,
}

impl FixtureRepo {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path();

        git(repo, &["init", "--quiet"]);
        git(repo, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        std::fs::write(repo.join("branch.txt"), "master\n").unwrap();
        git(repo, &["add", "branch.txt"]);
        git(repo, &["commit", "--quiet", "-m", "master"]);

        git(repo, &["checkout", "--quiet", "-b", "remote_test"]);
        std::fs::write(repo.join("branch.txt"), "remote_test\n").unwrap();
        git(repo, &["commit", "--quiet", "-am", "remote_test"]);
        git(repo, &["checkout", "--quiet", "master"]);

        Self { dir }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn url(&self) -> String {
        self.path().display().to_string()
    }

    pub(crate) fn head(&self, branch: &str) -> String {
        let out = Command::new("git")
            .args(["rev-parse", branch])
            .current_dir(self.path())
            .output()
            .unwrap();
        assert!(out.status.success());
        String::from_utf8(out.stdout).unwrap().trim().to_string()
    }
}

/// Scratch directory with its path canonicalized, so shell `pwd` output compares equal.
pub(crate) fn scratch_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().canonicalize().unwrap();
    (dir, path)
}

/// Log output collected from a subscriber installed on the current thread.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Route this thread's events here until the guard is dropped.
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=Tremble Tests",
            "-c",
            "user.email=tests@tremble.invalid",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=master",
        ])
        .args(args)
        .current_dir(repo)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}
