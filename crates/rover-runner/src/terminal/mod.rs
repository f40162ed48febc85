//! Named terminals that lifecycle operations type commands into.
//!
//! A terminal is a long-lived shell addressed by name; at most one exists per
//! name. The host tracks each terminal's working directory itself instead
//! of asking the shell.

mod shell;

pub use shell::ShellTerminals;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors from terminal operations.
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Failed to spawn terminal {name}: {reason}")]
    SpawnFailed { name: String, reason: String },

    #[error("Terminal not found: {name}")]
    NotFound { name: String },

    #[error("Terminal already exited: {name}")]
    Exited { name: String },
}

impl From<TerminalError> for rover_runner_core::Error {
    fn from(err: TerminalError) -> Self {
        let name = match &err {
            TerminalError::SpawnFailed { name, .. }
            | TerminalError::NotFound { name }
            | TerminalError::Exited { name } => name.clone(),
        };
        Self::Terminal {
            name,
            reason: err.to_string(),
        }
    }
}

/// Port for the host's terminal facility.
#[async_trait]
pub trait TerminalHost: Send + Sync {
    /// Reuse the terminal called `name`, or create it.
    async fn open(&self, name: &str) -> Result<(), TerminalError>;

    /// Type a line of text into the terminal.
    async fn send_text(&self, name: &str, text: &str) -> Result<(), TerminalError>;

    /// Working directory last recorded for the terminal.
    async fn working_dir(&self, name: &str) -> Option<PathBuf>;

    /// Record the working directory after a `cd` was sent.
    async fn set_working_dir(&self, name: &str, dir: &Path);

    /// Send an interrupt. Returns `false` if no such terminal exists.
    async fn interrupt(&self, name: &str) -> bool;

    /// Close the terminal and kill whatever runs in it.
    async fn dispose(&self, name: &str) -> Result<(), TerminalError>;

    async fn exists(&self, name: &str) -> bool;
}

/// Send `cd <dir>` unless the terminal is already there.
pub async fn change_dir(
    host: &dyn TerminalHost,
    name: &str,
    dir: &Path,
) -> Result<(), TerminalError> {
    if host.working_dir(name).await.as_deref() == Some(dir) {
        debug!(terminal = name, dir = %dir.display(), "Already in directory");
        return Ok(());
    }
    host.send_text(name, &format!("cd {}", shell_quote(&dir.to_string_lossy())))
        .await?;
    host.set_working_dir(name, dir).await;
    Ok(())
}

/// Interrupt a terminal, give it `grace` to wind down, then dispose it.
///
/// Missing terminals are fine and count as released.
pub async fn release(
    host: &dyn TerminalHost,
    name: &str,
    grace: Duration,
) -> Result<(), TerminalError> {
    if !host.interrupt(name).await {
        return Ok(());
    }
    tokio::time::sleep(grace).await;
    host.dispose(name).await
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        return value.to_owned();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
