//! Single-subgraph lifecycle: `Stopped -> Running -> Stopped`.

use std::path::PathBuf;

use rover_runner_core::{Error, Result, RunState, Subgraph, UrlMode};
use tracing::{debug, info, warn};

use super::{NoticeLevel, Runtime};
use crate::health::Liveness;
use crate::launch;
use crate::rover::{self, IntrospectRequest};
use crate::terminal::{self, shell_quote};

const UNMANAGED_NOTICE: &str = "Run the subgraph on your local machine! You might need to stop and play again if the subgraph isn't running";

/// How a local start was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStart {
    /// No sources known; the user runs the subgraph.
    Unmanaged,
    /// `node --inspect` in the subgraph terminal.
    Debug,
    /// `npm run start` in the subgraph terminal.
    Normal,
}

/// Result of stopping a subgraph. Stopping never fails; terminals that
/// could not be released are listed instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub name: String,
    pub lingering: Vec<String>,
}

impl StopOutcome {
    pub fn is_clean(&self) -> bool {
        self.lingering.is_empty()
    }
}

impl Runtime {
    async fn mark(&self, subgraph: &mut Subgraph, state: RunState) {
        subgraph.run_state = state;
        self.session.set_subgraph_state(&subgraph.name, state).await;
    }

    /// Run `rover subgraph introspect` against `url` into the runner dir.
    pub async fn introspect_schema(&self, subgraph: &Subgraph, url: &str) -> Result<PathBuf> {
        let request = IntrospectRequest {
            subgraph: subgraph.name.clone(),
            url: url.to_owned(),
            authorization: self.settings.rover.authorization().map(str::to_owned),
            working_dir: self.workspace.runner_dir(),
        };
        self.introspector.introspect(&request).await
    }

    /// Start the subgraph process itself and mark it running.
    pub async fn start_locally(&self, subgraph: &mut Subgraph, debug: bool) -> Result<LocalStart> {
        let Some(file_path) = subgraph.file_path.clone() else {
            self.notify(NoticeLevel::Info, UNMANAGED_NOTICE);
            tokio::time::sleep(self.settings.timing.unmanaged_settle()).await;
            self.mark(subgraph, RunState::Running).await;
            return Ok(LocalStart::Unmanaged);
        };

        let terminals = self.terminals();
        terminals.open(&subgraph.name).await?;
        terminal::change_dir(terminals, &subgraph.name, &file_path).await?;

        if debug {
            launch::ensure_descriptor(&self.workspace.launch_path(), &subgraph.name, &file_path)
                .await?;
            let program = launch::debug_program(&file_path);
            terminals
                .send_text(
                    &subgraph.name,
                    &format!(
                        "NODE_ENV=local node --inspect {}",
                        shell_quote(&program.to_string_lossy())
                    ),
                )
                .await?;
            info!(subgraph = %subgraph.name, "Launched in debug mode");
            self.mark(subgraph, RunState::Running).await;
            return Ok(LocalStart::Debug);
        }

        terminals.send_text(&subgraph.name, "npm run start").await?;
        tokio::time::sleep(self.settings.timing.settle()).await;
        info!(subgraph = %subgraph.name, "Launched in normal mode");
        self.mark(subgraph, RunState::Running).await;
        Ok(LocalStart::Normal)
    }

    /// Start a subgraph and `rover dev` in front of it.
    ///
    /// Any failure leaves the subgraph `Stopped`.
    pub async fn start_subgraph(&self, subgraph: &mut Subgraph, debug: bool) -> Result<String> {
        match self.start_subgraph_inner(subgraph, debug).await {
            Ok(()) => {
                self.mark(subgraph, RunState::Running).await;
                Ok(subgraph.name.clone())
            }
            Err(e) => {
                self.mark(subgraph, RunState::Stopped).await;
                Err(e)
            }
        }
    }

    async fn start_subgraph_inner(&self, subgraph: &mut Subgraph, debug: bool) -> Result<()> {
        let control = subgraph.control_terminal();
        let terminals = self.terminals();
        terminals.open(&control).await?;
        for line in rover::env_exports(&self.settings) {
            terminals.send_text(&control, &line).await?;
        }

        let url = match subgraph.url_mode {
            UrlMode::Local => {
                self.start_locally(subgraph, debug).await?;
                tokio::time::sleep(self.settings.timing.settle()).await;
                if self.health.probe(subgraph).await == Liveness::NotListening {
                    let err = Error::NotRunning {
                        name: subgraph.name.clone(),
                        managed: subgraph.is_managed(),
                    };
                    if subgraph.is_managed() {
                        terminals
                            .send_text(&control, &format!("echo {}", shell_quote(&err.to_string())))
                            .await?;
                    }
                    warn!(subgraph = %subgraph.name, url = %subgraph.local_url, "Nothing listening on local port");
                    return Err(err);
                }
                subgraph.local_url.clone()
            }
            UrlMode::Remote => subgraph.remote_url.clone(),
        };

        terminal::change_dir(terminals, &control, &self.workspace.runner_dir()).await?;
        self.introspect_schema(subgraph, &url).await?;
        terminals
            .send_text(
                &control,
                &rover::dev_subgraph_command(&self.settings.rover.binary, &subgraph.name, &url),
            )
            .await?;
        info!(subgraph = %subgraph.name, %url, mode = %subgraph.url_mode, "rover dev started");
        Ok(())
    }

    /// Release the control terminal and, in local mode, the subgraph's own
    /// terminal, then mark the subgraph stopped.
    pub async fn stop_subgraph(&self, subgraph: &mut Subgraph) -> StopOutcome {
        let grace = self.settings.timing.interrupt_grace();
        let mut names = vec![subgraph.control_terminal()];
        if subgraph.url_mode == UrlMode::Local {
            names.push(subgraph.name.clone());
        }

        let mut lingering = Vec::new();
        for name in names {
            if let Err(e) = terminal::release(self.terminals(), &name, grace).await {
                warn!(subgraph = %subgraph.name, terminal = %name, error = %e, "Terminal not released");
                lingering.push(name);
            }
        }
        self.mark(subgraph, RunState::Stopped).await;
        debug!(subgraph = %subgraph.name, lingering = lingering.len(), "Subgraph stopped");
        StopOutcome {
            name: subgraph.name.clone(),
            lingering,
        }
    }
}
