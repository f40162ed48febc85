//! Subgraph and supergraph lifecycle operations.
//!
//! [`Runtime`] owns every collaborator a lifecycle step needs: settings, the
//! session store, terminals, the introspector, the health check and the
//! remote URL lookup. Entity operations return `Result` and leave logging
//! and surfacing of errors to the orchestrator.

mod subgraph;
mod supergraph;


pub use subgraph::{LocalStart, StopOutcome};

use std::sync::Arc;

use rover_runner_core::settings::Settings;
use rover_runner_core::{
    ConfigStore, Declaration, Error, RemoteUrls, Result, SessionStore, UrlLookup, Workspace,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::health::{self, HealthCheck};
use crate::rover::{RoverCli, SchemaIntrospector};
use crate::studio::{StudioClient, StudioError};
use crate::terminal::{ShellTerminals, TerminalHost};

/// Name of the control terminal running `rover dev` for a supergraph.
pub const SUPERGRAPH_TERMINAL: &str = "Rover Runner";

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Signals for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    /// Entity state changed; redraw.
    Refresh,
    /// Message for the user.
    Notice { level: NoticeLevel, message: String },
}

/// External collaborators a [`Runtime`] drives.
pub struct Collaborators {
    pub terminals: Arc<dyn TerminalHost>,
    pub introspector: Arc<dyn SchemaIntrospector>,
    pub health: Arc<dyn HealthCheck>,
    pub lookup: Arc<dyn UrlLookup>,
}

/// Lookup used when Studio credentials are missing; fails without a request.
struct Unconfigured(String);

#[async_trait::async_trait]
impl UrlLookup for Unconfigured {
    async fn fetch_subgraph_urls(&self) -> Result<RemoteUrls> {
        Err(Error::NotConfigured(self.0.clone()))
    }
}

impl Collaborators {
    /// Real collaborators: shell terminals, the `rover` binary, the
    /// configured health check and the Studio client.
    pub fn from_settings(settings: &Settings, workspace: &Workspace) -> Result<Self> {
        let lookup: Arc<dyn UrlLookup> = match StudioClient::new(&settings.studio) {
            Ok(client) => Arc::new(client),
            Err(StudioError::Config(reason)) => {
                debug!(%reason, "Studio not configured");
                Arc::new(Unconfigured(reason))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            terminals: Arc::new(ShellTerminals::new(workspace.root())),
            introspector: Arc::new(RoverCli::new(&settings.rover.binary)),
            health: health::from_settings(settings.health_check),
            lookup,
        })
    }
}

/// Shared state and collaborators for lifecycle operations.
pub struct Runtime {
    settings: Settings,
    workspace: Workspace,
    store: ConfigStore,
    session: SessionStore,
    terminals: Arc<dyn TerminalHost>,
    introspector: Arc<dyn SchemaIntrospector>,
    health: Arc<dyn HealthCheck>,
    lookup: Arc<dyn UrlLookup>,
    events: broadcast::Sender<RunnerEvent>,
}

impl Runtime {
    pub fn new(settings: Settings, workspace: Workspace, collaborators: Collaborators) -> Self {
        let store = ConfigStore::new(
            workspace.declaration_path(&settings.workspace.config_filename),
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!(
            root = %workspace.root().display(),
            declaration = %store.path().display(),
            "Runtime created"
        );
        Self {
            settings,
            workspace,
            store,
            session: SessionStore::new(),
            terminals: collaborators.terminals,
            introspector: collaborators.introspector,
            health: collaborators.health,
            lookup: collaborators.lookup,
            events,
        }
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn terminals(&self) -> &dyn TerminalHost {
        self.terminals.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent> {
        self.events.subscribe()
    }

    pub fn refresh(&self) {
        // No receivers is fine.
        let _ = self.events.send(RunnerEvent::Refresh);
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Info => info!("{}", message),
            NoticeLevel::Warning => warn!("{}", message),
            NoticeLevel::Error => tracing::error!("{}", message),
        }
        let _ = self.events.send(RunnerEvent::Notice { level, message });
    }

    pub async fn declaration(&self) -> Result<Declaration> {
        self.store.load().await
    }

    /// Fetch remote URLs once.
    pub async fn remote_urls(&self) -> Result<RemoteUrls> {
        let urls = self.lookup.fetch_subgraph_urls().await?;
        debug!(count = urls.len(), "Fetched remote subgraph urls");
        Ok(urls)
    }
}
