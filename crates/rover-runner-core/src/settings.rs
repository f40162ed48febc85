//! Settings resolution for Rover Runner.
//!
//! Implements hierarchical settings resolution:
//! 1. Built-in defaults
//! 2. Global settings (~/.config/rover-runner/settings.json)
//! 3. Project settings (.rover-runner/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)
//!
//! File layers are deep-merged as JSON values, so a project file only needs
//! the keys it overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::routing::DEFAULT_FEDERATION_VERSION;

/// Complete Rover Runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub studio: StudioSettings,
    pub rover: RoverSettings,
    pub workspace: WorkspaceSettings,
    pub timing: TimingSettings,
    pub health_check: HealthCheckKind,
}

/// Apollo Studio credentials and endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudioSettings {
    pub api_key: String,
    pub graph_ref: String,
    pub endpoint: String,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            graph_ref: String::new(),
            endpoint: "https://api.apollographql.com/graphql".to_string(),
        }
    }
}

impl StudioSettings {
    /// Both the API key and the graph ref are set.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.graph_ref.is_empty()
    }
}

/// How `rover` is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoverSettings {
    pub binary: PathBuf,
    /// Exported as `APOLLO_ROVER_DEV_ROUTER_VERSION`.
    pub router_version: String,
    pub federation_version: String,
    /// Full `Authorization` header value sent when introspecting.
    pub authorization_header: String,
}

impl Default for RoverSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rover"),
            router_version: String::new(),
            federation_version: DEFAULT_FEDERATION_VERSION.to_string(),
            authorization_header: String::new(),
        }
    }
}

impl RoverSettings {
    pub fn authorization(&self) -> Option<&str> {
        Some(self.authorization_header.as_str()).filter(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceSettings {
    /// Declaration file name inside `.rover-runner/`.
    pub config_filename: String,
    /// Start `redis-server` alongside subgraphs.
    pub use_redis: bool,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            config_filename: "supergraph.json".to_string(),
            use_redis: false,
        }
    }
}

/// Fixed settle delays, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingSettings {
    /// Wait after launching a managed subgraph before probing it.
    pub settle_ms: u64,
    /// Wait for the user to start an unmanaged subgraph by hand.
    pub unmanaged_settle_ms: u64,
    /// Wait between interrupting a terminal and disposing it.
    pub interrupt_grace_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            settle_ms: 3000,
            unmanaged_settle_ms: 5000,
            interrupt_grace_ms: 3000,
        }
    }
}

impl TimingSettings {
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub const fn unmanaged_settle(&self) -> Duration {
        Duration::from_millis(self.unmanaged_settle_ms)
    }

    pub const fn interrupt_grace(&self) -> Duration {
        Duration::from_millis(self.interrupt_grace_ms)
    }

    /// All delays zeroed.
    pub const fn immediate() -> Self {
        Self {
            settle_ms: 0,
            unmanaged_settle_ms: 0,
            interrupt_grace_ms: 0,
        }
    }
}

/// Strategy deciding whether a locally started subgraph came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckKind {
    /// Try to bind the local port; a successful bind means nothing listens.
    #[default]
    Port,
    /// Wait the settle delay and assume the subgraph is up.
    Delay,
}

/// Load settings with hierarchical resolution.
pub fn load_settings(project_dir: Option<&Path>) -> Result<Settings> {
    let mut merged = serde_json::to_value(Settings::default())?;
    let mut last_source = None;

    if let Some(global_path) = global_settings_path() {
        if global_path.exists() {
            merge_values(&mut merged, load_settings_file(&global_path)?);
            last_source = Some(global_path);
        }
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".rover-runner").join("settings.json");
        if project_path.exists() {
            merge_values(&mut merged, load_settings_file(&project_path)?);
            last_source = Some(project_path);
        }
    }

    let mut settings: Settings =
        serde_json::from_value(merged).map_err(|e| Error::MalformedConfig {
            path: last_source.unwrap_or_default(),
            reason: e.to_string(),
        })?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Global settings file path.
pub fn global_settings_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".rover-runner").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME").ok().map(|h| {
            PathBuf::from(h).join("Library/Application Support/rover-runner/settings.json")
        })
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("rover-runner").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_settings_file(path: &Path) -> Result<serde_json::Value> {
    let malformed = |reason: String| Error::MalformedConfig {
        path: path.to_path_buf(),
        reason,
    };
    let content = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))
}

/// Recursively overlay `overlay` onto `base`. Objects merge key by key;
/// any other value replaces what was there.
fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("APOLLO_KEY") {
        settings.studio.api_key = val;
    }
    if let Some(val) = var("APOLLO_GRAPH_REF") {
        settings.studio.graph_ref = val;
    }
    if let Some(val) = var("ROVER_RUNNER_ROUTER_VERSION") {
        settings.rover.router_version = val;
    }
    if let Some(val) = var("ROVER_RUNNER_FEDERATION_VERSION") {
        settings.rover.federation_version = val;
    }
    if let Some(val) = var("ROVER_RUNNER_AUTH_HEADER") {
        settings.rover.authorization_header = val;
    }
    if let Some(val) = var("ROVER_RUNNER_ROVER_BIN") {
        settings.rover.binary = PathBuf::from(val);
    }
    if let Some(val) = var("ROVER_RUNNER_CONFIG_FILENAME") {
        settings.workspace.config_filename = val;
    }
    if let Some(val) = var("ROVER_RUNNER_USE_REDIS") {
        if let Ok(flag) = val.parse() {
            settings.workspace.use_redis = flag;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.rover.federation_version, "=2.3.2");
        assert_eq!(settings.workspace.config_filename, "supergraph.json");
        assert_eq!(settings.timing.settle(), Duration::from_secs(3));
        assert_eq!(settings.timing.unmanaged_settle(), Duration::from_secs(5));
        assert_eq!(settings.health_check, HealthCheckKind::Port);
        assert!(!settings.studio.is_configured());
        assert!(settings.rover.authorization().is_none());
    }

    #[test]
    fn partial_overlay_keeps_sibling_defaults() {
        let mut merged = serde_json::to_value(Settings::default()).unwrap();
        merge_values(
            &mut merged,
            serde_json::json!({ "rover": { "routerVersion": "1.19.0" }, "healthCheck": "delay" }),
        );
        let settings: Settings = serde_json::from_value(merged).unwrap();
        assert_eq!(settings.rover.router_version, "1.19.0");
        assert_eq!(settings.rover.federation_version, "=2.3.2");
        assert_eq!(settings.health_check, HealthCheckKind::Delay);
    }

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".rover-runner")).unwrap();
        std::fs::write(
            dir.path().join(".rover-runner/settings.json"),
            r#"{ "workspace": { "useRedis": true }, "timing": { "settleMs": 10 } }"#,
        )
        .unwrap();
        let settings = load_settings(Some(dir.path())).unwrap();
        assert!(settings.workspace.use_redis);
        assert_eq!(settings.timing.settle_ms, 10);
        assert_eq!(settings.timing.interrupt_grace_ms, 3000);
    }

    #[test]
    fn unparsable_project_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".rover-runner")).unwrap();
        let path = dir.path().join(".rover-runner/settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = load_settings(Some(dir.path())).unwrap_err();
        assert!(matches!(err, Error::MalformedConfig { path: ref p, .. } if p == &path));
        assert!(err.to_string().starts_with("Malformed config file"));
    }

    #[test]
    fn mistyped_project_setting_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".rover-runner/settings.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"timing": {"settleMs": "soon"}}"#).unwrap();
        assert!(matches!(
            load_settings(Some(dir.path())),
            Err(Error::MalformedConfig { path: p, .. }) if p == path
        ));
    }

    #[test]
    fn overrides_apply_credentials_and_flags() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, |key| match key {
            "APOLLO_KEY" => Some("service:key".into()),
            "APOLLO_GRAPH_REF" => Some("graph@current".into()),
            "ROVER_RUNNER_USE_REDIS" => Some("true".into()),
            _ => None,
        });
        assert!(settings.studio.is_configured());
        assert!(settings.workspace.use_redis);
    }
}
