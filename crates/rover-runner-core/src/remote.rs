//! Remote source of truth for subgraph URLs.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// Subgraph URLs reported by the remote lookup, keyed by subgraph name.
///
/// An empty value is a valid answer (the graph variant has no subgraphs);
/// lookups that produced no data at all fail with
/// [`crate::Error::RemoteUnavailable`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteUrls(HashMap<String, String>);

impl RemoteUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.0.insert(name.into(), url.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Effective remote URL for `name`.
    ///
    /// An explicit `devUrl` in the declaration wins, then the remote lookup,
    /// then the empty string.
    pub fn effective_url(&self, name: &str, declared: Option<&str>) -> String {
        declared
            .or_else(|| self.get(name))
            .unwrap_or_default()
            .to_owned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RemoteUrls {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Port for fetching subgraph URLs from the remote registry.
///
/// Implementations must fail with [`crate::Error::NotConfigured`] before any
/// network traffic when credentials are missing.
#[async_trait]
pub trait UrlLookup: Send + Sync {
    async fn fetch_subgraph_urls(&self) -> Result<RemoteUrls>;
}
