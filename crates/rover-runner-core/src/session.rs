//! Session-scoped entity state.
//!
//! Holds the run state of every subgraph and supergraph and the url mode
//! chosen for each subgraph. Nothing here outlives the process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::{RunState, UrlMode};

#[derive(Debug, Default)]
struct SessionState {
    subgraphs: HashMap<String, RunState>,
    supergraphs: HashMap<String, RunState>,
    url_modes: HashMap<String, UrlMode>,
}

/// Cheaply cloneable handle to the session state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subgraph_state(&self, name: &str) -> RunState {
        self.inner
            .read()
            .await
            .subgraphs
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    pub async fn set_subgraph_state(&self, name: &str, state: RunState) {
        self.inner
            .write()
            .await
            .subgraphs
            .insert(name.to_owned(), state);
    }

    pub async fn supergraph_state(&self, name: &str) -> RunState {
        self.inner
            .read()
            .await
            .supergraphs
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    pub async fn set_supergraph_state(&self, name: &str, state: RunState) {
        self.inner
            .write()
            .await
            .supergraphs
            .insert(name.to_owned(), state);
    }

    pub async fn url_mode(&self, name: &str) -> UrlMode {
        self.inner
            .read()
            .await
            .url_modes
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    pub async fn set_url_mode(&self, name: &str, mode: UrlMode) {
        self.inner
            .write()
            .await
            .url_modes
            .insert(name.to_owned(), mode);
    }

    /// Names of subgraphs currently recorded as running.
    pub async fn running_subgraphs(&self) -> Vec<String> {
        let state = self.inner.read().await;
        let mut names: Vec<String> = state
            .subgraphs
            .iter()
            .filter(|(_, s)| **s == RunState::Running)
            .map(|(n, _)| n.clone())
            .collect();
        drop(state);
        names.sort();
        names
    }
}
