//! Well-known paths inside a Rover Runner workspace.

use std::path::{Path, PathBuf};

/// Directory holding the declaration file, schemas and router documents.
pub const RUNNER_DIR: &str = ".rover-runner";

/// Composed routing document consumed by `rover dev --supergraph-config`.
pub const ROUTING_FILE: &str = "supergraph.yaml";

/// Router configuration passed to every `rover dev` invocation.
pub const ROUTER_CONFIG_FILE: &str = "router.yaml";

/// Root of the workspace the runner operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/.rover-runner`
    pub fn runner_dir(&self) -> PathBuf {
        self.root.join(RUNNER_DIR)
    }

    /// `<root>/.rover-runner/<filename>`
    pub fn declaration_path(&self, filename: &str) -> PathBuf {
        self.runner_dir().join(filename)
    }

    pub fn routing_path(&self) -> PathBuf {
        self.runner_dir().join(ROUTING_FILE)
    }

    /// Introspected schema for a subgraph: `<root>/.rover-runner/<name>.graphql`.
    pub fn schema_path(&self, subgraph: &str) -> PathBuf {
        self.runner_dir().join(format!("{subgraph}.graphql"))
    }

    /// Debug launch descriptors: `<root>/.vscode/launch.json`.
    pub fn launch_path(&self) -> PathBuf {
        self.root.join(".vscode").join("launch.json")
    }

    /// Project-level settings file: `<root>/.rover-runner/settings.json`.
    pub fn settings_path(&self) -> PathBuf {
        self.runner_dir().join("settings.json")
    }
}
