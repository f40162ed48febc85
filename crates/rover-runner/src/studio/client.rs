//! Apollo Studio GraphQL client.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use rover_runner_core::settings::StudioSettings;
use rover_runner_core::{Error, RemoteUrls, UrlLookup};
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{GET_SUBGRAPH_URLS, GraphQlRequest, RefVariables, VariantResponse};

const CLIENT_NAME: &str = "rover-runner";

/// Studio client errors.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Studio API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    GraphQl(String),

    #[error("Invalid graph ref: {0}")]
    InvalidRef(String),

    #[error("Studio returned no data")]
    NoData,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StudioError> for Error {
    fn from(err: StudioError) -> Self {
        match err {
            StudioError::Config(reason) => Self::NotConfigured(reason),
            other => Self::RemoteUnavailable(other.to_string()),
        }
    }
}

/// Client for the `GetSubgraphUrls` query.
#[derive(Debug)]
pub struct StudioClient {
    http: reqwest::Client,
    endpoint: String,
    graph_ref: String,
}

impl StudioClient {
    /// Create a client from Studio settings.
    ///
    /// Fails with [`StudioError::Config`] before any network access when the
    /// key or graph ref is missing.
    pub fn new(settings: &StudioSettings) -> Result<Self, StudioError> {
        if settings.api_key.is_empty() {
            return Err(StudioError::Config("apiKey is empty".into()));
        }
        if settings.graph_ref.is_empty() {
            return Err(StudioError::Config("graphRef is empty".into()));
        }
        if settings.endpoint.is_empty() {
            return Err(StudioError::Config("endpoint is empty".into()));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&settings.api_key)
            .map_err(|_| StudioError::Config("Invalid apiKey format".into()))?;
        headers.insert(HeaderName::from_static("x-api-key"), key);
        headers.insert(
            HeaderName::from_static("apollographql-client-name"),
            HeaderValue::from_static(CLIENT_NAME),
        );
        headers.insert(
            HeaderName::from_static("apollographql-client-version"),
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Err only means a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            graph_ref: settings.graph_ref.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn check_status(resp: &reqwest::Response) -> Result<(), StudioError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(StudioError::Api {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").into(),
            });
        }
        Ok(())
    }

    /// Fetch subgraph URLs for the configured graph ref.
    pub async fn subgraph_urls(&self) -> Result<RemoteUrls, StudioError> {
        let body = GraphQlRequest {
            operation_name: "GetSubgraphUrls",
            query: GET_SUBGRAPH_URLS,
            variables: RefVariables {
                graph_ref: &self.graph_ref,
            },
        };
        debug!(endpoint = %self.endpoint, graph_ref = %self.graph_ref, "Fetching subgraph urls");
        let resp = self.http.post(&self.endpoint).json(&body).send().await?;
        Self::check_status(&resp)?;
        let parsed: VariantResponse = resp.json().await?;
        interpret(parsed)
    }
}

/// Turn a Studio response into URLs.
///
/// GraphQL errors, an `InvalidRefFormat` answer and a missing `data` field
/// are failures; a `null` variant is an empty answer.
pub(crate) fn interpret(response: VariantResponse) -> Result<RemoteUrls, StudioError> {
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(StudioError::GraphQl(messages.join("; ")));
    }
    let data = response.data.ok_or(StudioError::NoData)?;
    let Some(variant) = data.variant else {
        warn!("Graph variant not found, no remote urls available");
        return Ok(RemoteUrls::new());
    };
    if let Some(message) = variant.message {
        return Err(StudioError::InvalidRef(message));
    }
    Ok(variant
        .subgraphs
        .unwrap_or_default()
        .into_iter()
        .filter_map(|s| s.url.map(|url| (s.name, url)))
        .collect())
}

#[async_trait]
impl UrlLookup for StudioClient {
    async fn fetch_subgraph_urls(&self) -> rover_runner_core::Result<RemoteUrls> {
        self.subgraph_urls().await.map_err(Error::from)
    }
}
