//! Lifecycle phases of a Runner invocation.

use std::fmt;

/// Phase of a single run.
///
/// The progression is linear: `Start -> Acquiring -> Running -> Cleaning -> Done`.
/// `Error` is entered from `Acquiring` or `Running`; cleanup still follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Resolving the workspace path.
    Start,
    /// Cloning and checking out the branch.
    Acquiring,
    /// Command is executing inside the workspace.
    Running,
    /// An acquisition or execution error has been recorded.
    Error,
    /// Removing the workspace.
    Cleaning,
    /// Workspace is gone and the outcome is final.
    Done,
}

impl RunPhase {
    /// Returns true if moving from `self` to `next` is a legal step.
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (*self, next),
            (Start, Acquiring)
                | (Acquiring, Running)
                | (Acquiring, Error)
                | (Running, Cleaning)
                | (Running, Error)
                | (Error, Cleaning)
                | (Cleaning, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Acquiring => "ACQUIRING",
            Self::Running => "RUNNING",
            Self::Error => "ERROR",
            Self::Cleaning => "CLEANING",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
