//! Composed routing document for `rover dev --supergraph-config`.
//!
//! The document is rebuilt in full on every supergraph start and written
//! over whatever was there before.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Federation version used when the settings do not name one.
pub const DEFAULT_FEDERATION_VERSION: &str = "=2.3.2";

/// Routing configuration for every subgraph in a supergraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub federation_version: String,
    pub subgraphs: BTreeMap<String, SubgraphRouting>,
}

/// Routing and schema source for a single subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphRouting {
    pub routing_url: String,
    pub schema: SchemaSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSource {
    pub subgraph_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_headers: Option<IntrospectionHeaders>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionHeaders {
    #[serde(rename = "Authorization")]
    pub authorization: String,
}

impl RoutingConfig {
    pub fn new(federation_version: impl Into<String>) -> Self {
        Self {
            federation_version: federation_version.into(),
            subgraphs: BTreeMap::new(),
        }
    }

    /// Add or replace the routing entry for `name`.
    pub fn insert(&mut self, name: impl Into<String>, routing: SubgraphRouting) {
        self.subgraphs.insert(name.into(), routing);
    }

    pub fn len(&self) -> usize {
        self.subgraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subgraphs.is_empty()
    }

    /// Render the document as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| Error::Io(std::io::Error::other(format!("serialize routing document: {e}"))))
    }
}

impl SubgraphRouting {
    /// Route and introspect at the same URL; an empty header is omitted.
    pub fn new(url: &str, authorization: Option<&str>) -> Self {
        Self {
            routing_url: url.to_owned(),
            schema: SchemaSource {
                subgraph_url: url.to_owned(),
                introspection_headers: authorization.filter(|h| !h.is_empty()).map(|h| {
                    IntrospectionHeaders {
                        authorization: h.to_owned(),
                    }
                }),
            },
        }
    }
}

/// Writes [`RoutingConfig`] documents to a fixed path.
#[derive(Debug, Clone)]
pub struct RoutingConfigWriter {
    path: PathBuf,
}

impl RoutingConfigWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize and overwrite the routing document.
    pub async fn write(&self, config: &RoutingConfig) -> Result<()> {
        let yaml = config.to_yaml()?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, yaml).await?;
        debug!(
            path = %self.path.display(),
            subgraphs = config.len(),
            "Wrote routing document"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn block_without_header_omits_introspection_headers() {
        let block = SubgraphRouting::new("http://localhost:4001/graphql", None);
        assert_eq!(block.routing_url, block.schema.subgraph_url);
        assert!(block.schema.introspection_headers.is_none());

        let empty = SubgraphRouting::new("http://localhost:4001/graphql", Some(""));
        assert!(empty.schema.introspection_headers.is_none());
    }

    #[test]
    fn block_with_header_carries_authorization() {
        let block = SubgraphRouting::new("https://x", Some("Bearer abc"));
        assert_eq!(
            block.schema.introspection_headers.unwrap().authorization,
            "Bearer abc"
        );
    }

    #[test]
    fn yaml_uses_router_field_names() {
        let mut config = RoutingConfig::new(DEFAULT_FEDERATION_VERSION);
        config.insert("users", SubgraphRouting::new("https://users", Some("Bearer t")));
        config.insert("orders", SubgraphRouting::new("http://localhost:4002", None));

        let yaml = config.to_yaml().unwrap();
        let value: serde_json::Value = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(value["federation_version"], "=2.3.2");
        assert_eq!(value["subgraphs"]["users"]["routing_url"], "https://users");
        assert_eq!(
            value["subgraphs"]["users"]["schema"]["introspection_headers"]["Authorization"],
            "Bearer t"
        );
        assert_eq!(
            value["subgraphs"]["orders"]["schema"]["subgraph_url"],
            "http://localhost:4002"
        );
        assert!(value["subgraphs"]["orders"]["schema"]
            .get("introspection_headers")
            .is_none());
    }

    #[tokio::test]
    async fn writer_overwrites_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RoutingConfigWriter::new(dir.path().join(".rover-runner/supergraph.yaml"));

        let mut first = RoutingConfig::new("=2.3.2");
        first.insert("a", SubgraphRouting::new("http://a", None));
        first.insert("b", SubgraphRouting::new("http://b", None));
        writer.write(&first).await.unwrap();

        let mut second = RoutingConfig::new("=2.4.0");
        second.insert("c", SubgraphRouting::new("http://c", None));
        writer.write(&second).await.unwrap();

        let written = std::fs::read_to_string(writer.path()).unwrap();
        let parsed: RoutingConfig = serde_saphyr::from_str(&written).unwrap();
        assert_eq!(parsed, second);
    }
}
