//! The `rover` CLI: schema introspection and `rover dev` command lines.
//!
//! Introspection runs as a child process whose exit status decides the
//! outcome. `rover dev` is long-running and is typed into a control
//! terminal instead, so only its command line is built here.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use rover_runner_core::settings::Settings;
use rover_runner_core::workspace::{ROUTER_CONFIG_FILE, ROUTING_FILE};
use rover_runner_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::terminal::shell_quote;

/// One `rover subgraph introspect` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectRequest {
    pub subgraph: String,
    pub url: String,
    /// Full `Authorization` header value, if one is configured.
    pub authorization: Option<String>,
    /// Directory the schema file is written into.
    pub working_dir: PathBuf,
}

impl IntrospectRequest {
    /// `<working_dir>/<subgraph>.graphql`
    pub fn output_path(&self) -> PathBuf {
        self.working_dir.join(self.output_file())
    }

    fn output_file(&self) -> String {
        format!("{}.graphql", self.subgraph)
    }
}

/// Port for schema introspection.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Write the subgraph schema and return its path.
    async fn introspect(&self, request: &IntrospectRequest) -> Result<PathBuf>;
}

/// Runs the real `rover` binary.
#[derive(Debug, Clone)]
pub struct RoverCli {
    binary: PathBuf,
}

impl RoverCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments after the binary name.
    pub fn introspect_args(request: &IntrospectRequest) -> Vec<String> {
        let mut args = vec![
            "subgraph".to_string(),
            "introspect".to_string(),
            request.url.clone(),
        ];
        if let Some(auth) = &request.authorization {
            args.push("--header".to_string());
            args.push(format!("Authorization: {auth}"));
        }
        args.push("--output".to_string());
        args.push(request.output_file());
        args
    }
}

#[async_trait]
impl SchemaIntrospector for RoverCli {
    async fn introspect(&self, request: &IntrospectRequest) -> Result<PathBuf> {
        let failed = || Error::IntrospectionFailed {
            url: request.url.clone(),
        };
        info!(subgraph = %request.subgraph, url = %request.url, "Introspecting schema");
        let output = tokio::process::Command::new(&self.binary)
            .args(Self::introspect_args(request))
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                warn!(binary = %self.binary.display(), error = %e, "Failed to launch rover");
                failed()
            })?;

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(subgraph = %request.subgraph, "rover: {}", line);
        }
        if !output.status.success() {
            warn!(
                subgraph = %request.subgraph,
                status = ?output.status.code(),
                "rover subgraph introspect failed"
            );
            return Err(failed());
        }
        Ok(request.output_path())
    }
}

/// `export` lines for the variables `rover dev` reads.
pub fn env_exports(settings: &Settings) -> Vec<String> {
    [
        ("APOLLO_GRAPH_REF", settings.studio.graph_ref.as_str()),
        ("APOLLO_KEY", settings.studio.api_key.as_str()),
        (
            "APOLLO_ROVER_DEV_ROUTER_VERSION",
            settings.rover.router_version.as_str(),
        ),
        ("ROVER_TOK", settings.rover.authorization_header.as_str()),
    ]
    .into_iter()
    .map(|(key, value)| format!("export {key}={}", shell_quote(value)))
    .collect()
}

fn binary_word(binary: &Path) -> String {
    shell_quote(&binary.to_string_lossy())
}

/// `rover dev` for a single subgraph, run from the runner directory.
pub fn dev_subgraph_command(binary: &Path, name: &str, url: &str) -> String {
    format!(
        "{} dev --router-config ./{ROUTER_CONFIG_FILE} --name {} --schema {} --url {} --elv2-license=accept",
        binary_word(binary),
        shell_quote(name),
        shell_quote(&format!("{name}.graphql")),
        shell_quote(url),
    )
}

/// `rover dev` over the composed routing document.
pub fn dev_supergraph_command(binary: &Path) -> String {
    format!(
        "{} dev --router-config ./{ROUTER_CONFIG_FILE} --supergraph-config ./{ROUTING_FILE} --elv2-license=accept",
        binary_word(binary),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(auth: Option<&str>) -> IntrospectRequest {
        IntrospectRequest {
            subgraph: "users".into(),
            url: "http://localhost:4001/graphql".into(),
            authorization: auth.map(str::to_owned),
            working_dir: PathBuf::from("/ws/.rover-runner"),
        }
    }

    #[test]
    fn introspect_args_without_auth() {
        assert_eq!(
            RoverCli::introspect_args(&request(None)),
            vec![
                "subgraph",
                "introspect",
                "http://localhost:4001/graphql",
                "--output",
                "users.graphql"
            ]
        );
    }

    #[test]
    fn introspect_args_attach_auth_header() {
        let args = RoverCli::introspect_args(&request(Some("Bearer tok")));
        assert_eq!(args[3], "--header");
        assert_eq!(args[4], "Authorization: Bearer tok");
        assert_eq!(
            request(None).output_path(),
            PathBuf::from("/ws/.rover-runner/users.graphql")
        );
    }

    #[test]
    fn env_exports_cover_rover_variables() {
        let mut settings = Settings::default();
        settings.studio.graph_ref = "shop@current".into();
        settings.studio.api_key = "service:key".into();
        settings.rover.router_version = "v1.30.0".into();
        settings.rover.authorization_header = "Bearer tok".into();
        assert_eq!(
            env_exports(&settings),
            vec![
                "export APOLLO_GRAPH_REF=shop@current",
                "export APOLLO_KEY=service:key",
                "export APOLLO_ROVER_DEV_ROUTER_VERSION=v1.30.0",
                "export ROVER_TOK='Bearer tok'",
            ]
        );
    }

    #[test]
    fn dev_commands() {
        let rover = Path::new("rover");
        assert_eq!(
            dev_subgraph_command(rover, "users", "http://localhost:4001/graphql"),
            "rover dev --router-config ./router.yaml --name users --schema users.graphql --url http://localhost:4001/graphql --elv2-license=accept"
        );
        assert_eq!(
            dev_supergraph_command(rover),
            "rover dev --router-config ./router.yaml --supergraph-config ./supergraph.yaml --elv2-license=accept"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_introspection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cli = RoverCli::new("/definitely/not/rover");
        let req = IntrospectRequest {
            working_dir: dir.path().to_path_buf(),
            ..request(None)
        };
        let err = cli.introspect(&req).await.unwrap_err();
        assert!(matches!(err, Error::IntrospectionFailed { ref url } if url == "http://localhost:4001/graphql"));
    }
}
