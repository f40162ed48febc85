//! Rover Runner CLI
//!
//! Without a subcommand, starts the interactive shell.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use rover_runner::commands::{self, Action};
use rover_runner::lifecycle::{Collaborators, Runtime};
use rover_runner::orchestrator::Orchestrator;
use rover_runner::shell;
use rover_runner_core::Workspace;
use rover_runner_core::settings::load_settings;
use rover_runner_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "rover-runner")]
#[command(version, about = "Run subgraphs and supergraphs behind rover dev", long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(short, long, env = "ROVER_RUNNER_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Declaration file name inside .rover-runner/
    #[arg(long)]
    config_filename: Option<String>,

    /// Apollo Studio graph ref
    #[arg(long)]
    graph_ref: Option<String>,

    /// Router version for rover dev
    #[arg(long)]
    router_version: Option<String>,

    /// Start redis-server alongside subgraphs
    #[arg(long)]
    use_redis: bool,

    /// Log level for rover-runner crates (overridden by RUST_LOG)
    #[arg(long, env = "ROVER_RUNNER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "ROVER_RUNNER_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Action>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(
        &format!(
            "rover_runner={level},rover_runner_core={level}",
            level = cli.log_level
        ),
        cli.log_json,
    );

    let root = match cli.workspace {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let mut settings = load_settings(Some(&root))?;
    if let Some(filename) = cli.config_filename {
        settings.workspace.config_filename = filename;
    }
    if let Some(graph_ref) = cli.graph_ref {
        settings.studio.graph_ref = graph_ref;
    }
    if let Some(version) = cli.router_version {
        settings.rover.router_version = version;
    }
    if cli.use_redis {
        settings.workspace.use_redis = true;
    }

    info!(version = env!("CARGO_PKG_VERSION"), root = %root.display(), "Starting rover-runner");

    let workspace = Workspace::new(root);
    let collaborators = Collaborators::from_settings(&settings, &workspace)?;
    let orch = Orchestrator::new(Runtime::new(settings, workspace, collaborators));
    let printer = shell::spawn_notice_printer(orch.runtime().subscribe());

    let result = match cli.command {
        None => shell::run(&orch).await,
        Some(action) => run_once(&orch, action).await,
    };
    printer.abort();
    result
}

/// Run one action. Lifecycle actions keep their processes until Ctrl+C.
async fn run_once(orch: &Orchestrator, action: Action) -> anyhow::Result<()> {
    if action.is_session_only() {
        anyhow::bail!(commands::SESSION_ONLY_HINT);
    }
    let mut out = io::stdout();
    let lifecycle = action.is_lifecycle();
    if let Err(e) = commands::execute(orch, action, &mut out).await {
        if lifecycle {
            // Clean up whatever the failed start left behind.
            let _ = orch.stop_all().await;
        }
        return Err(e);
    }
    if lifecycle {
        writeln!(out, "Press Ctrl+C to stop.")?;
        tokio::signal::ctrl_c().await?;
        writeln!(out, "Stopping...")?;
        orch.stop_all().await?;
    }
    Ok(())
}
