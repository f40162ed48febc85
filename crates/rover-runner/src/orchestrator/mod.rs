//! Top-level command handlers.
//!
//! The orchestrator enforces the single-run-at-a-time rule, sequences the
//! lifecycle operations of [`Runtime`] and reconciles state afterwards. It is
//! the only layer that logs failures.

mod lock;


pub use lock::{RunLock, RunPermit};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use rover_runner_core::template::generate_template;
use rover_runner_core::{
    Declaration, Error, RemoteUrls, Result, RunState, Subgraph, Supergraph, UrlMode,
};
use tracing::{debug, info, warn};

use crate::lifecycle::{NoticeLevel, Runtime, SUPERGRAPH_TERMINAL};
use crate::redis;
use crate::terminal;

/// A supergraph run that completed and still holds the run-lock.
#[derive(Debug)]
struct ActiveRun {
    supergraph: String,
    permit: RunPermit,
}

/// Marks a subgraph start as in flight until dropped.
struct StartGuard<'a> {
    starting: &'a Mutex<HashSet<String>>,
    name: String,
}

impl<'a> StartGuard<'a> {
    fn claim(starting: &'a Mutex<HashSet<String>>, name: &str) -> Option<Self> {
        let claimed = starting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned());
        claimed.then(|| Self {
            starting,
            name: name.to_owned(),
        })
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.starting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

fn already_running(name: &str) -> Error {
    Error::AlreadyRunning(format!("Subgraph {name} is already running!"))
}

fn surface<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!(operation, error = %e, "Operation failed");
    }
    result
}

pub struct Orchestrator {
    runtime: Runtime,
    lock: RunLock,
    active_run: tokio::sync::Mutex<Option<ActiveRun>>,
    starting: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            lock: RunLock::new(),
            active_run: tokio::sync::Mutex::new(None),
            starting: Mutex::new(HashSet::new()),
        }
    }

    pub const fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    /// Supergraph currently holding the run-lock, if any.
    pub async fn active_supergraph(&self) -> Option<String> {
        self.active_run
            .lock()
            .await
            .as_ref()
            .map(|run| run.supergraph.clone())
    }

    /// Write the sample declaration unless one exists.
    pub async fn init(&self) -> Result<Option<PathBuf>> {
        let written = surface(
            "init",
            generate_template(
                self.runtime.workspace(),
                &self.runtime.settings().workspace.config_filename,
            )
            .await,
        )?;
        self.runtime.refresh();
        Ok(written)
    }

    /// Every supergraph, `All` first, with children resolved.
    ///
    /// A missing workspace or declaration yields an empty tree and a notice.
    /// Missing Studio credentials fail with [`Error::NotConfigured`].
    pub async fn tree(&self) -> Result<Vec<Supergraph>> {
        let runtime = &self.runtime;
        if !runtime.workspace().root().is_dir() {
            runtime.notify(NoticeLevel::Info, "No subgraphs in empty workspace");
            return Ok(Vec::new());
        }
        let declaration = match runtime.declaration().await {
            Ok(declaration) => declaration,
            Err(Error::NotFound(_)) => {
                runtime.notify(
                    NoticeLevel::Info,
                    format!(
                        "Please create .rover-runner/{}",
                        runtime.settings().workspace.config_filename
                    ),
                );
                return Ok(Vec::new());
            }
            Err(e) => return surface("list", Err(e)),
        };
        let remote = match runtime.remote_urls().await {
            Ok(remote) => Some(remote),
            Err(e @ Error::NotConfigured(_)) => return surface("list", Err(e)),
            Err(e) => {
                warn!(error = %e, "Remote url lookup failed");
                None
            }
        };

        let mut supergraphs = runtime
            .store()
            .supergraphs(&declaration, runtime.session())
            .await;
        for supergraph in &mut supergraphs {
            match &remote {
                Some(remote) => {
                    runtime
                        .resolve_children_with(&declaration, remote, supergraph)
                        .await;
                }
                None => runtime.notify(
                    NoticeLevel::Error,
                    format!(
                        "There was an error retrieving subgraphs from {}",
                        supergraph.name
                    ),
                ),
            }
        }
        Ok(supergraphs)
    }

    /// Build the subgraph `name` without consulting the remote lookup.
    pub async fn find_subgraph(&self, name: &str) -> Result<Subgraph> {
        let declaration = self.runtime.declaration().await?;
        self.offline_subgraph(&declaration, name).await
    }

    async fn offline_subgraph(&self, declaration: &Declaration, name: &str) -> Result<Subgraph> {
        self.runtime
            .store()
            .subgraph(declaration, name, &RemoteUrls::new(), self.runtime.session())
            .await
            .ok_or_else(|| Error::UnknownEntity {
                kind: "subgraph",
                name: name.to_owned(),
            })
    }

    async fn offline_supergraph(&self, declaration: &Declaration, name: &str) -> Supergraph {
        let runtime = &self.runtime;
        let mut supergraph = Supergraph::new(name, declaration.members_of(name));
        supergraph.run_state = runtime.session().supergraph_state(name).await;
        let (children, _) = runtime
            .store()
            .children(declaration, name, &RemoteUrls::new(), runtime.session())
            .await;
        supergraph.children = children;
        supergraph
    }

    async fn start_redis(&self) {
        if !self.runtime.settings().workspace.use_redis {
            return;
        }
        if let Err(e) = redis::start(self.runtime.terminals()).await {
            self.runtime
                .notify(NoticeLevel::Warning, format!("Failed to start redis: {e}"));
        }
    }

    /// Start one subgraph and `rover dev` in front of it.
    pub async fn run_subgraph(&self, name: &str, debug: bool) -> Result<String> {
        surface("run", self.run_subgraph_inner(name, debug).await)
    }

    async fn run_subgraph_inner(&self, name: &str, debug: bool) -> Result<String> {
        let _guard = StartGuard::claim(&self.starting, name).ok_or_else(|| already_running(name))?;
        let runtime = &self.runtime;
        if runtime.session().subgraph_state(name).await == RunState::Running {
            return Err(already_running(name));
        }
        self.start_redis().await;

        let declaration = runtime.declaration().await?;
        let remote = if runtime.session().url_mode(name).await == UrlMode::Remote {
            runtime.remote_urls().await?
        } else {
            RemoteUrls::new()
        };
        let mut subgraph = runtime
            .store()
            .subgraph(&declaration, name, &remote, runtime.session())
            .await
            .ok_or_else(|| Error::UnknownEntity {
                kind: "subgraph",
                name: name.to_owned(),
            })?;

        let debug_mode = debug;
        info!(subgraph = name, url = %subgraph.url(), debug_mode, "Running subgraph");
        let started = runtime.start_subgraph(&mut subgraph, debug).await?;
        runtime.refresh();
        Ok(started)
    }

    /// Stop one subgraph. Never fails for a declared subgraph.
    pub async fn stop_subgraph(&self, name: &str) -> Result<String> {
        let mut subgraph = surface("stop", self.find_subgraph(name).await)?;
        info!(subgraph = name, "Stopping subgraph");
        let outcome = self.runtime.stop_subgraph(&mut subgraph).await;
        if !outcome.is_clean() {
            self.runtime.notify(
                NoticeLevel::Warning,
                format!(
                    "Could not close terminals for {}: {}",
                    outcome.name,
                    outcome.lingering.join(", ")
                ),
            );
        }
        self.runtime.refresh();
        Ok(outcome.name)
    }

    /// Start every child of `name` and `rover dev` over the composition.
    ///
    /// Fails with [`Error::AlreadyRunning`] without touching any state when
    /// another run holds the lock. On success the lock stays held until the
    /// supergraph is stopped.
    pub async fn run_supergraph(&self, name: &str, debug: bool) -> Result<String> {
        surface("up", self.run_supergraph_inner(name, debug).await)
    }

    async fn run_supergraph_inner(&self, name: &str, debug: bool) -> Result<String> {
        let permit = self.lock.try_acquire().ok_or_else(Error::run_in_progress)?;
        self.start_redis().await;

        let runtime = &self.runtime;
        let declaration = runtime.declaration().await?;
        if !declaration.declares_supergraph(name) {
            return Err(Error::UnknownEntity {
                kind: "supergraph",
                name: name.to_owned(),
            });
        }
        let mut supergraph = Supergraph::new(name, declaration.members_of(name));
        let remote = runtime.remote_urls().await?;
        runtime
            .resolve_children_with(&declaration, &remote, &mut supergraph)
            .await;

        info!(supergraph = name, children = supergraph.children.len(), "Running supergraph");
        let started = runtime.run_supergraph(&mut supergraph, debug).await?;
        *self.active_run.lock().await = Some(ActiveRun {
            supergraph: started.clone(),
            permit,
        });
        runtime.refresh();
        Ok(started)
    }

    /// Stop a supergraph and its running children.
    ///
    /// Stopping releases the shared `rover dev` terminal, so the supergraph
    /// holding the run-lock, whichever it is, is marked stopped and the lock
    /// is released.
    pub async fn stop_supergraph(&self, name: &str) -> Result<String> {
        surface("down", self.stop_supergraph_inner(name).await)
    }

    async fn stop_supergraph_inner(&self, name: &str) -> Result<String> {
        let declaration = self.runtime.declaration().await?;
        if !declaration.declares_supergraph(name) {
            return Err(Error::UnknownEntity {
                kind: "supergraph",
                name: name.to_owned(),
            });
        }
        let mut supergraph = self.offline_supergraph(&declaration, name).await;
        info!(supergraph = name, "Stopping supergraph");
        let stopped = self.runtime.stop_supergraph(&mut supergraph).await?;

        // The shared `rover dev` terminal is gone, so whichever run held the
        // lock has ended too.
        let ended = self.active_run.lock().await.take();
        if let Some(run) = ended {
            if run.supergraph != stopped {
                self.runtime
                    .session()
                    .set_supergraph_state(&run.supergraph, RunState::Stopped)
                    .await;
                info!(supergraph = %run.supergraph, stopped = %stopped, "Active supergraph ended by another stop");
            }
            debug!(supergraph = %run.supergraph, "Releasing run-lock");
        }
        self.runtime.refresh();
        Ok(stopped)
    }

    /// Stop every supergraph and subgraph, then the redis sidecar.
    ///
    /// Takes the run-lock itself, or over from a completed supergraph run.
    /// Fails with [`Error::AlreadyRunning`] while a run is still starting.
    pub async fn stop_all(&self) -> Result<()> {
        surface("stop-all", self.stop_all_inner().await)
    }

    async fn stop_all_inner(&self) -> Result<()> {
        let _permit = match self.lock.try_acquire() {
            Some(permit) => permit,
            None => {
                let active = self.active_run.lock().await.take();
                active.ok_or_else(Error::run_in_progress)?.permit
            }
        };
        let runtime = &self.runtime;
        let mut failed = Vec::new();

        match runtime.declaration().await {
            Ok(declaration) => {
                for supergraph in runtime.store().supergraphs(&declaration, runtime.session()).await {
                    let mut supergraph = self.offline_supergraph(&declaration, &supergraph.name).await;
                    match runtime.stop_supergraph(&mut supergraph).await {
                        Ok(name) => debug!(supergraph = %name, "Stopped"),
                        Err(Error::PartialStopFailure(names)) => failed.extend(names),
                        Err(e) => return Err(e),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Declaration unavailable, stopping session subgraphs only");
                if let Err(e) = terminal::release(
                    runtime.terminals(),
                    SUPERGRAPH_TERMINAL,
                    runtime.settings().timing.interrupt_grace(),
                )
                .await
                {
                    warn!(error = %e, "Terminal not released");
                    failed.push(SUPERGRAPH_TERMINAL.to_owned());
                }
            }
        }

        // Running subgraphs the declaration no longer names.
        for name in runtime.session().running_subgraphs().await {
            let mut subgraph = Subgraph::new(name.as_str());
            subgraph.url_mode = runtime.session().url_mode(&name).await;
            let outcome = runtime.stop_subgraph(&mut subgraph).await;
            if !outcome.is_clean() {
                failed.push(outcome.name);
            }
        }

        if let Err(e) =
            redis::stop(runtime.terminals(), runtime.settings().timing.interrupt_grace()).await
        {
            warn!(error = %e, "Redis terminal not released");
            failed.push(redis::REDIS_TERMINAL.to_owned());
        }

        runtime.refresh();
        failed.sort();
        failed.dedup();
        if failed.is_empty() {
            info!("Stopped everything");
            Ok(())
        } else {
            Err(Error::PartialStopFailure(failed))
        }
    }

    /// Choose which URL a subgraph uses from now on.
    pub async fn use_url(&self, name: &str, mode: UrlMode) -> Result<()> {
        let subgraph = surface("use-url", self.find_subgraph(name).await)?;
        self.runtime.session().set_url_mode(&subgraph.name, mode).await;
        info!(subgraph = name, %mode, "Url mode changed");
        self.runtime.refresh();
        Ok(())
    }

    /// Persist a new local or remote URL in the declaration file.
    pub async fn set_url(&self, name: &str, mode: UrlMode, url: &str) -> Result<()> {
        surface(
            "set-url",
            self.runtime.store().update_url(name, mode, url).await,
        )?;
        self.runtime.refresh();
        Ok(())
    }
}
