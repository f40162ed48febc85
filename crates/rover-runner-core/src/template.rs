//! Workspace scaffolding for `rover-runner init`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::info;

use crate::declaration::{Declaration, SubgraphDeclaration};
use crate::error::Result;
use crate::workspace::Workspace;

/// Sample declaration showing unmanaged, managed and overridden subgraphs.
pub fn sample_declaration() -> Declaration {
    let subgraphs = BTreeMap::from([
        (
            "Subgraph1".to_string(),
            SubgraphDeclaration {
                path: String::new(),
                local_url: "http://localhost:3000/graphql".to_string(),
                dev_url: None,
            },
        ),
        (
            "Subgraph2".to_string(),
            SubgraphDeclaration {
                path: "subgraphs/subgraph2".to_string(),
                local_url: "http://localhost:3001/graphql".to_string(),
                dev_url: None,
            },
        ),
        (
            "Subgraph3".to_string(),
            SubgraphDeclaration {
                path: "subgraphs/subgraph3".to_string(),
                local_url: "http://localhost:3002/graphql".to_string(),
                dev_url: Some(
                    "https://sampleendpointoverridingstudioconfig.com/graphql".to_string(),
                ),
            },
        ),
    ]);
    let supergraphs = BTreeMap::from([
        (
            "Supergraph1".to_string(),
            vec!["Subgraph1".to_string(), "Subgraph3".to_string()],
        ),
        (
            "Supergraph2".to_string(),
            vec!["Subgraph2".to_string(), "Subgraph3".to_string()],
        ),
    ]);
    Declaration {
        subgraphs,
        supergraphs,
    }
}

/// Create `.rover-runner/` and `.vscode/`, and write the sample declaration
/// unless one already exists.
///
/// Returns the path of the written declaration, or `None` if it was kept.
pub async fn generate_template(workspace: &Workspace, filename: &str) -> Result<Option<PathBuf>> {
    tokio::fs::create_dir_all(workspace.runner_dir()).await?;
    tokio::fs::create_dir_all(workspace.root().join(".vscode")).await?;

    let path = workspace.declaration_path(filename);
    if tokio::fs::try_exists(&path).await? {
        info!(path = %path.display(), "Declaration already exists, leaving it untouched");
        return Ok(None);
    }
    let json = serde_json::to_string_pretty(&sample_declaration())?;
    tokio::fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote sample declaration");
    Ok(Some(path))
}
