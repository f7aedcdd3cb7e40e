//! Tremble - run a command against a git branch in a throwaway workspace.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tremble_core::{RunRequest, Runner};
use tremble_server::{create_router, AppState, Config};

/// Exit status used when a run is interrupted with Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Tremble - minimal CI runner
#[derive(Parser)]
#[command(name = "tremble")]
#[command(about = "Run a command against a git branch in a throwaway workspace", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the gitlab trigger endpoint and the history page
    Serve {
        /// Directory for tests.log, error.log and workspaces
        #[arg(long, env = "TREMBLE_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Command to run in every triggered checkout
        #[arg(long, env = "TREMBLE_COMMAND")]
        command: String,

        /// Title of the history page
        #[arg(long, env = "TREMBLE_PAGE_TITLE")]
        page_title: Option<String>,

        /// Address to listen on
        #[arg(long, env = "TREMBLE_BIND", default_value = "127.0.0.1:8080")]
        bind: String,

        /// Kill the command after this many seconds (0 = never)
        #[arg(long, env = "TREMBLE_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
    },

    /// Clone a branch, run a command in it once, and exit with its code
    Run {
        /// Repository URL or path
        repository: String,

        /// Branch to check out
        branch: String,

        /// Shell command to run
        command: String,

        /// Use this directory as the workspace (it is deleted afterwards)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Kill the command after this many seconds (0 = never)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout is reserved for command output
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            data_dir,
            command,
            page_title,
            bind,
            timeout_secs,
        } => {
            let config = Config {
                page_title,
                bind_addr: bind,
                timeout: timeout_secs.map(Duration::from_secs),
                ..Config::new(data_dir, command)
            };
            serve(config).await?;
        }
        Commands::Run {
            repository,
            branch,
            command,
            work_dir,
            timeout_secs,
        } => {
            let code = run_once(repository, branch, command, work_dir, timeout_secs).await?;
            std::process::exit(code);
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(&config.bind_addr).await?;

    info!(
        addr = %config.bind_addr,
        data_dir = %config.data_dir.display(),
        command = %config.command,
        "Starting Tremble server"
    );

    let router = create_router(AppState::new(config));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn run_once(
    repository: String,
    branch: String,
    command: String,
    work_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
) -> Result<i32, Box<dyn std::error::Error>> {
    let runner = Runner::default();
    let mut stdout = tokio::io::stdout();

    let mut request = RunRequest::new(repository, branch, command).with_output(&mut stdout);
    if let Some(dir) = work_dir {
        request = request.with_work_dir(dir);
    }
    if let Some(secs) = timeout_secs {
        request = request.with_timeout(Duration::from_secs(secs));
    }

    tokio::select! {
        result = runner.run(request) => {
            let result = result?;
            // Mirror the shell convention for signal deaths.
            Ok(match result.signal {
                Some(signal) => 128 + signal,
                None => result.exit_code,
            })
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling run");
            Ok(INTERRUPTED_EXIT_CODE)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
