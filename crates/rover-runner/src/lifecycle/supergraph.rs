//! Aggregate lifecycle: resolve children, start them all, compose the
//! routing document and run `rover dev` over it.

use futures::future::join_all;
use rover_runner_core::{
    Declaration, Error, RemoteUrls, Result, RoutingConfig, RoutingConfigWriter, RunState,
    Subgraph, Supergraph, UrlMode,
};
use tracing::{debug, info, warn};

use super::{NoticeLevel, Runtime, SUPERGRAPH_TERMINAL};
use crate::health::Liveness;
use crate::rover;
use crate::terminal;

impl Runtime {
    /// Fill in `supergraph.children` from the declaration and `remote`.
    ///
    /// Undeclared members are skipped with a warning notice.
    pub async fn resolve_children_with(
        &self,
        declaration: &Declaration,
        remote: &RemoteUrls,
        supergraph: &mut Supergraph,
    ) {
        let (children, missing) = self
            .store
            .children(declaration, &supergraph.name, remote, &self.session)
            .await;
        for name in missing {
            self.notify(
                NoticeLevel::Warning,
                format!(
                    "Subgraph {name} in supergraph {} is not declared in {}",
                    supergraph.name,
                    self.store.path().display()
                ),
            );
        }
        supergraph.children = children;
    }

    /// Fetch remote URLs once and resolve the children of `supergraph`.
    pub async fn resolve_children(&self, supergraph: &mut Supergraph) -> Result<()> {
        let declaration = self.declaration().await?;
        let remote = self.remote_urls().await?;
        self.resolve_children_with(&declaration, &remote, supergraph)
            .await;
        Ok(())
    }

    async fn start_child(&self, child: &mut Subgraph, debug: bool) -> Result<()> {
        self.start_locally(child, debug).await?;
        tokio::time::sleep(self.settings.timing.settle()).await;
        if self.health.probe(child).await == Liveness::NotListening {
            child.run_state = RunState::Stopped;
            self.session
                .set_subgraph_state(&child.name, RunState::Stopped)
                .await;
            return Err(Error::NotRunning {
                name: child.name.clone(),
                managed: child.is_managed(),
            });
        }
        info!(subgraph = %child.name, url = %child.url(), "Child running");
        Ok(())
    }

    /// Start every child, write the routing document and launch `rover dev`.
    ///
    /// Children are expected to be resolved. A failing local child fails the
    /// whole run; children already marked running stay running.
    pub async fn run_supergraph(&self, supergraph: &mut Supergraph, debug: bool) -> Result<String> {
        if let Some(running) = supergraph.children.iter().find(|c| c.is_running()) {
            return Err(Error::AlreadyRunning(format!(
                "Subgraph {} is already running!",
                running.name
            )));
        }

        let mut routing = RoutingConfig::new(self.settings.rover.federation_version.clone());
        let authorization = self.settings.rover.authorization();
        let mut starts = Vec::new();
        for child in &mut supergraph.children {
            routing.insert(child.name.clone(), child.routing_block(authorization));
            match child.url_mode {
                UrlMode::Remote => {
                    child.run_state = RunState::Running;
                    self.session
                        .set_subgraph_state(&child.name, RunState::Running)
                        .await;
                }
                UrlMode::Local => starts.push(self.start_child(child, debug)),
            }
        }
        debug!(
            supergraph = %supergraph.name,
            local = starts.len(),
            subgraphs = routing.len(),
            "Starting children"
        );

        let mut failures = join_all(starts).await.into_iter().filter_map(|r| r.err());
        if let Some(first) = failures.next() {
            for other in failures {
                warn!(supergraph = %supergraph.name, error = %other, "Child failed to start");
            }
            return Err(first);
        }

        RoutingConfigWriter::new(self.workspace.routing_path())
            .write(&routing)
            .await?;

        let terminals = self.terminals();
        terminals.open(SUPERGRAPH_TERMINAL).await?;
        for line in rover::env_exports(&self.settings) {
            terminals.send_text(SUPERGRAPH_TERMINAL, &line).await?;
        }
        terminal::change_dir(terminals, SUPERGRAPH_TERMINAL, &self.workspace.runner_dir()).await?;
        terminals
            .send_text(
                SUPERGRAPH_TERMINAL,
                &rover::dev_supergraph_command(&self.settings.rover.binary),
            )
            .await?;

        supergraph.run_state = RunState::Running;
        self.session
            .set_supergraph_state(&supergraph.name, RunState::Running)
            .await;
        info!(supergraph = %supergraph.name, "Supergraph running");
        Ok(supergraph.name.clone())
    }

    /// Release the supergraph control terminal and stop every running child.
    pub async fn stop_supergraph(&self, supergraph: &mut Supergraph) -> Result<String> {
        let mut failed = Vec::new();
        if let Err(e) = terminal::release(
            self.terminals(),
            SUPERGRAPH_TERMINAL,
            self.settings.timing.interrupt_grace(),
        )
        .await
        {
            warn!(terminal = SUPERGRAPH_TERMINAL, error = %e, "Terminal not released");
            failed.push(SUPERGRAPH_TERMINAL.to_owned());
        }

        let running = self.session.running_subgraphs().await;
        let stops = supergraph
            .children
            .iter_mut()
            .filter(|c| running.contains(&c.name))
            .map(|c| self.stop_subgraph(c));
        for outcome in join_all(stops).await {
            if !outcome.is_clean() {
                failed.push(outcome.name);
            }
        }
        if !failed.is_empty() {
            return Err(Error::PartialStopFailure(failed));
        }

        supergraph.run_state = RunState::Stopped;
        self.session
            .set_supergraph_state(&supergraph.name, RunState::Stopped)
            .await;
        info!(supergraph = %supergraph.name, "Supergraph stopped");
        Ok(supergraph.name.clone())
    }
}
