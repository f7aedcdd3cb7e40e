//! Tremble Core
//!
//! Runs a shell command against a git branch in a throwaway workspace:
//! - [`WorkspaceManager`] clones and force-checks-out the branch, and deletes the tree
//! - [`CommandExecutor`] runs the command there, streaming combined output
//! - [`Runner`] composes the two and removes the workspace on every exit path
//!
//! # Example
//!
//! ```rust,no_run
//! use tremble_core::{RunRequest, Runner};
//!
//! async fn check() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = Runner::default();
//!     let mut output: Vec<u8> = Vec::new();
//!
//!     let result = runner
//!         .run(
//!             RunRequest::new("https://example.com/project.git", "master", "make test")
//!                 .with_output(&mut output),
//!         )
//!         .await?;
//!
//!     println!("exit code {}", result.exit_code);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod ids;
pub mod phase;
pub mod runner;
pub mod workspace;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::RunnerConfig;
pub use error::{AcquisitionError, ExecutionError, ReleaseError, RunError};
pub use executor::{CommandExecutor, ExitOutcome, OutputSink, SIGNALLED_EXIT_CODE};
pub use ids::RunId;
pub use phase::RunPhase;
pub use runner::{RunRequest, RunResult, Runner};
pub use workspace::{Workspace, WorkspaceGuard, WorkspaceManager};
