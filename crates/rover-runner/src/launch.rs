//! Debug launch descriptors in `.vscode/launch.json`.

use std::path::{Path, PathBuf};

use rover_runner_core::{Error, Result};
use serde_json::{Value, json};
use tracing::{debug, info};

const LAUNCH_VERSION: &str = "0.2.0";

/// Entry point a debug launch runs: `<file_path>/server.js`.
pub fn debug_program(file_path: &Path) -> PathBuf {
    file_path.join("server.js")
}

/// Launch configuration for one subgraph.
pub fn descriptor(name: &str, file_path: &Path) -> Value {
    json!({
        "type": "node",
        "request": "launch",
        "name": name,
        "program": debug_program(file_path).to_string_lossy(),
        "skipFiles": ["<node_internals>/**"],
        "env": { "NODE_ENV": "local" },
        "console": "integratedTerminal",
    })
}

/// Add a launch configuration named `name` unless one exists.
///
/// A missing or configuration-less file is replaced by a fresh document.
/// Returns `true` when the file was written.
pub async fn ensure_descriptor(launch_path: &Path, name: &str, file_path: &Path) -> Result<bool> {
    let mut document = match tokio::fs::read_to_string(launch_path).await {
        Ok(content) => serde_json::from_str::<Value>(&content).map_err(|e| {
            Error::MalformedConfig {
                path: launch_path.to_path_buf(),
                reason: e.to_string(),
            }
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Null,
        Err(e) => return Err(e.into()),
    };
    if !document.get("configurations").is_some_and(Value::is_array) {
        document = json!({ "version": LAUNCH_VERSION, "configurations": [] });
    }
    let Some(configurations) = document
        .get_mut("configurations")
        .and_then(Value::as_array_mut)
    else {
        return Ok(false);
    };
    if configurations
        .iter()
        .any(|conf| conf.get("name").and_then(Value::as_str) == Some(name))
    {
        debug!(subgraph = name, "Launch configuration already present");
        return Ok(false);
    }
    configurations.push(descriptor(name, file_path));

    if let Some(parent) = launch_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(launch_path, serde_json::to_string_pretty(&document)?).await?;
    info!(subgraph = name, path = %launch_path.display(), "Added launch configuration");
    Ok(true)
}
