//! Error types for Rover Runner.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using Rover Runner `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every lifecycle operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Studio credentials or other required settings are missing.
    #[error("Apollo Studio is not configured: {0}. Update the Rover Runner settings and refresh")]
    NotConfigured(String),

    /// The remote URL lookup failed or returned no data.
    #[error("Failed to fetch subgraph URLs from Apollo Studio: {0}")]
    RemoteUnavailable(String),

    /// The declaration file does not exist.
    #[error("Please create {}", .0.display())]
    NotFound(PathBuf),

    /// A declaration, settings or launch file could not be read or parsed.
    #[error("Malformed config file {}: {reason}", path.display())]
    MalformedConfig { path: PathBuf, reason: String },

    /// A subgraph or supergraph name does not appear in the declarations.
    #[error("No {kind} named {name} is declared")]
    UnknownEntity { kind: &'static str, name: String },

    /// The liveness probe found nothing listening on the local port.
    #[error("{}", not_running_message(name, *managed))]
    NotRunning { name: String, managed: bool },

    /// `rover subgraph introspect` exited unsuccessfully.
    #[error("Introspection failed at {url}. Make sure Auth is up to date")]
    IntrospectionFailed { url: String },

    /// The run-lock is held, or a child was already running.
    #[error("{0}")]
    AlreadyRunning(String),

    /// One or more children could not be stopped cleanly.
    #[error("Failed to stop subgraphs: {}", .0.join(", "))]
    PartialStopFailure(Vec<String>),

    /// A terminal could not be spawned or written to.
    #[error("Terminal {name}: {reason}")]
    Terminal { name: String, reason: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn not_running_message(name: &str, managed: bool) -> String {
    if managed {
        format!(
            "The {name} subgraph is not running. Please check for errors in the terminal and then try again"
        )
    } else {
        format!(
            "The {name} subgraph is not running. Please add a filepath in the declaration file or run the subgraph yourself"
        )
    }
}

impl Error {
    /// Lock contention on the process-wide run-lock.
    pub fn run_in_progress() -> Self {
        Self::AlreadyRunning("Another process is already running in Rover Runner!".into())
    }
}
