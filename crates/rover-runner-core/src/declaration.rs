//! Subgraph/supergraph declaration file.
//!
//! The declaration lives in `.rover-runner/<configFilename>` and has two
//! top-level maps:
//!
//! ```json
//! {
//!   "subgraphs": { "users": { "path": "subgraphs/users", "localUrl": "http://localhost:4001/graphql" } },
//!   "supergraphs": { "shop": ["users"] }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{ALL_SUPERGRAPH, Subgraph, Supergraph, UrlMode};
use crate::remote::RemoteUrls;
use crate::session::SessionStore;
use crate::workspace::RUNNER_DIR;

/// Parsed declaration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    #[serde(default)]
    pub subgraphs: BTreeMap<String, SubgraphDeclaration>,
    #[serde(default)]
    pub supergraphs: BTreeMap<String, Vec<String>>,
}

/// A single subgraph entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphDeclaration {
    /// Source directory, absolute or relative to the workspace root.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub local_url: String,
    /// Overrides the URL reported by the remote lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_url: Option<String>,
}

impl Declaration {
    /// Subgraph names making up `supergraph`; every subgraph for `All`.
    pub fn members_of(&self, supergraph: &str) -> Vec<String> {
        if supergraph == ALL_SUPERGRAPH {
            self.subgraphs.keys().cloned().collect()
        } else {
            self.supergraphs.get(supergraph).cloned().unwrap_or_default()
        }
    }

    pub fn declares_supergraph(&self, name: &str) -> bool {
        name == ALL_SUPERGRAPH || self.supergraphs.contains_key(name)
    }
}

/// Workspace root for a declaration file.
///
/// This is the parent of the `.rover-runner` directory when the file lives
/// under one, and the file's own directory otherwise.
pub fn workspace_root(config_path: &Path) -> PathBuf {
    config_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.file_name().is_some_and(|n| n == RUNNER_DIR))
        .and_then(Path::parent)
        .or_else(|| config_path.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Resolve a declared subgraph path.
///
/// Empty paths mean "unmanaged" and resolve to `None`; absolute paths pass
/// through; relative paths are joined onto the workspace root.
pub fn resolve_path(relative: &str, config_path: &Path) -> Option<PathBuf> {
    if relative.is_empty() {
        return None;
    }
    let path = Path::new(relative);
    if path.is_absolute() {
        return Some(path.to_path_buf());
    }
    Some(workspace_root(config_path).join(path))
}

/// Loads declarations and builds entities from them.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and parse the declaration file.
    pub async fn load(&self) -> Result<Declaration> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| Error::MalformedConfig {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub fn resolve_path(&self, relative: &str) -> Option<PathBuf> {
        resolve_path(relative, &self.path)
    }

    /// Build the subgraph entity `name`, restoring its session state.
    ///
    /// Returns `None` when the declaration has no such subgraph.
    pub async fn subgraph(
        &self,
        declaration: &Declaration,
        name: &str,
        remote: &RemoteUrls,
        session: &SessionStore,
    ) -> Option<Subgraph> {
        let decl = declaration.subgraphs.get(name)?;
        Some(Subgraph {
            name: name.to_owned(),
            url_mode: session.url_mode(name).await,
            local_url: decl.local_url.clone(),
            remote_url: remote.effective_url(name, decl.dev_url.as_deref()),
            file_path: self.resolve_path(&decl.path),
            run_state: session.subgraph_state(name).await,
        })
    }

    /// Resolve the children of `supergraph`.
    ///
    /// Members missing from the subgraph declarations are skipped and their
    /// names returned alongside the resolved children.
    pub async fn children(
        &self,
        declaration: &Declaration,
        supergraph: &str,
        remote: &RemoteUrls,
        session: &SessionStore,
    ) -> (Vec<Subgraph>, Vec<String>) {
        let mut children = Vec::new();
        let mut missing = Vec::new();
        for name in declaration.members_of(supergraph) {
            match self.subgraph(declaration, &name, remote, session).await {
                Some(child) => children.push(child),
                None => missing.push(name),
            }
        }
        debug!(
            supergraph,
            children = children.len(),
            missing = missing.len(),
            "Resolved supergraph children"
        );
        (children, missing)
    }

    /// Every supergraph, `All` first, with session state restored and no
    /// children resolved yet.
    pub async fn supergraphs(
        &self,
        declaration: &Declaration,
        session: &SessionStore,
    ) -> Vec<Supergraph> {
        let mut supergraphs = Vec::with_capacity(declaration.supergraphs.len() + 1);
        let mut all = Supergraph::new(ALL_SUPERGRAPH, declaration.members_of(ALL_SUPERGRAPH));
        all.run_state = session.supergraph_state(ALL_SUPERGRAPH).await;
        supergraphs.push(all);
        for (name, members) in &declaration.supergraphs {
            let mut supergraph = Supergraph::new(name.clone(), members.clone());
            supergraph.run_state = session.supergraph_state(name).await;
            supergraphs.push(supergraph);
        }
        supergraphs
    }

    /// Rewrite the local or remote URL of a subgraph in the declaration file.
    ///
    /// Unknown fields in the file are preserved.
    pub async fn update_url(&self, name: &str, mode: UrlMode, url: &str) -> Result<()> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut document: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| Error::MalformedConfig {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        let entry = document
            .get_mut("subgraphs")
            .and_then(|s| s.get_mut(name))
            .and_then(serde_json::Value::as_object_mut)
            .ok_or_else(|| Error::UnknownEntity {
                kind: "subgraph",
                name: name.to_owned(),
            })?;
        entry.insert(
            mode.declaration_key().to_owned(),
            serde_json::Value::String(url.to_owned()),
        );
        let pretty = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&self.path, pretty).await?;
        debug!(subgraph = name, %mode, url, "Updated declared url");
        Ok(())
    }
}
