//! Terminals backed by `sh` child processes.
//!
//! Each terminal is a shell reading commands from a piped stdin. Output is
//! forwarded line by line into the log with the terminal name attached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use super::{TerminalError, TerminalHost};

struct ShellTerminal {
    child: Child,
    stdin_tx: mpsc::Sender<String>,
    working_dir: PathBuf,
}

/// Terminal host spawning one shell per terminal name.
pub struct ShellTerminals {
    terminals: Arc<RwLock<HashMap<String, ShellTerminal>>>,
    shell: PathBuf,
    /// Directory new terminals start in.
    start_dir: PathBuf,
}

impl ShellTerminals {
    pub fn new(start_dir: impl Into<PathBuf>) -> Self {
        Self::with_shell("sh", start_dir)
    }

    pub fn with_shell(shell: impl Into<PathBuf>, start_dir: impl Into<PathBuf>) -> Self {
        Self {
            terminals: Arc::new(RwLock::new(HashMap::new())),
            shell: shell.into(),
            start_dir: start_dir.into(),
        }
    }

    fn spawn(&self, name: &str) -> Result<ShellTerminal, TerminalError> {
        let mut cmd = Command::new(&self.shell);
        cmd.current_dir(&self.start_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so an interrupt reaches the foreground job too.
        #[cfg(unix)]
        cmd.process_group(0);

        info!(terminal = name, dir = %self.start_dir.display(), "Opening terminal");
        let mut child = cmd.spawn().map_err(|e| TerminalError::SpawnFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TerminalError::SpawnFailed {
                name: name.to_string(),
                reason: "Failed to capture stdin".to_string(),
            })?;
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(32);
        let term = name.to_string();
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = stdin_rx.recv().await {
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    error!(terminal = %term, "Failed to write to stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.write_all(b"\n").await {
                    error!(terminal = %term, "Failed to write newline: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    error!(terminal = %term, "Failed to flush stdin: {}", e);
                    break;
                }
            }
        });

        if let Some(stdout) = child.stdout.take() {
            let term = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(terminal = %term, "{}", line);
                }
                debug!(terminal = %term, "stdout reader finished");
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let term = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(terminal = %term, "{}", line);
                }
                debug!(terminal = %term, "stderr reader finished");
            });
        }

        Ok(ShellTerminal {
            child,
            stdin_tx,
            working_dir: self.start_dir.clone(),
        })
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let Ok(pgid) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: pgid is the process group of a child we spawned with
    // `process_group(0)`; kill(2) has no memory-safety preconditions.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(-pgid, signal) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        warn!(pid, signal, error = %err, "Failed to signal terminal process group");
        return false;
    }
    true
}

#[async_trait]
impl TerminalHost for ShellTerminals {
    async fn open(&self, name: &str) -> Result<(), TerminalError> {
        let mut terminals = self.terminals.write().await;
        if let Some(existing) = terminals.get_mut(name) {
            if matches!(existing.child.try_wait(), Ok(None)) {
                return Ok(());
            }
            debug!(terminal = name, "Terminal shell exited, replacing it");
            terminals.remove(name);
        }
        let terminal = self.spawn(name)?;
        terminals.insert(name.to_string(), terminal);
        drop(terminals);
        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn send_text(&self, name: &str, text: &str) -> Result<(), TerminalError> {
        let terminals = self.terminals.read().await;
        let terminal = terminals.get(name).ok_or_else(|| TerminalError::NotFound {
            name: name.to_string(),
        })?;
        debug!(terminal = name, "send: {}", text);
        terminal
            .stdin_tx
            .send(text.to_string())
            .await
            .map_err(|_| TerminalError::Exited {
                name: name.to_string(),
            })
    }

    async fn working_dir(&self, name: &str) -> Option<PathBuf> {
        self.terminals
            .read()
            .await
            .get(name)
            .map(|t| t.working_dir.clone())
    }

    async fn set_working_dir(&self, name: &str, dir: &Path) {
        if let Some(terminal) = self.terminals.write().await.get_mut(name) {
            terminal.working_dir = dir.to_path_buf();
        }
    }

    async fn interrupt(&self, name: &str) -> bool {
        let terminals = self.terminals.read().await;
        let Some(terminal) = terminals.get(name) else {
            return false;
        };
        debug!(terminal = name, "Interrupting terminal");
        #[cfg(unix)]
        signal_group(&terminal.child, libc::SIGINT);
        drop(terminals);
        true
    }

    async fn dispose(&self, name: &str) -> Result<(), TerminalError> {
        let mut terminal = self
            .terminals
            .write()
            .await
            .remove(name)
            .ok_or_else(|| TerminalError::NotFound {
                name: name.to_string(),
            })?;
        #[cfg(unix)]
        signal_group(&terminal.child, libc::SIGKILL);
        match terminal.child.kill().await {
            Ok(()) => info!(terminal = name, "Terminal disposed"),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
                debug!(terminal = name, "Terminal shell had already exited");
            }
            Err(e) => {
                warn!(terminal = name, error = %e, "Failed to kill terminal shell");
                return Err(TerminalError::Exited {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn exists(&self, name: &str) -> bool {
        self.terminals.read().await.contains_key(name)
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_is_idempotent_per_name() {
        let dir = tempfile::tempdir().unwrap();
        let host = ShellTerminals::new(dir.path());
        host.open("users").await.unwrap();
        host.open("users").await.unwrap();
        assert_eq!(host.terminals.read().await.len(), 1);
        assert_eq!(host.working_dir("users").await, Some(dir.path().to_path_buf()));
        host.dispose("users").await.unwrap();
        assert!(!host.exists("users").await);
    }

    #[tokio::test]
    async fn send_to_missing_terminal_fails() {
        let host = ShellTerminals::new(std::env::temp_dir());
        let err = host.send_text("ghost", "echo hi").await.unwrap_err();
        assert!(matches!(err, TerminalError::NotFound { .. }));
        assert!(!host.interrupt("ghost").await);
    }

    #[tokio::test]
    async fn commands_run_in_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let host = ShellTerminals::new(dir.path());
        host.open("t").await.unwrap();
        host.send_text("t", "echo ready > marker.txt").await.unwrap();

        let marker = dir.path().join("marker.txt");
        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "ready");
        host.dispose("t").await.unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let host = ShellTerminals::with_shell("/definitely/not/a/shell", std::env::temp_dir());
        let err = host.open("t").await.unwrap_err();
        assert!(matches!(err, TerminalError::SpawnFailed { .. }));
    }
}
