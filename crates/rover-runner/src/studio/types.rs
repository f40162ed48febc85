//! Studio GraphQL request and response types.

use serde::{Deserialize, Serialize};

/// Query returning every subgraph of a graph variant with its routing URL.
pub const GET_SUBGRAPH_URLS: &str = "query GetSubgraphUrls($ref: ID!) { variant(ref: $ref) { ... on GraphVariant { subgraphs { name url } } ... on InvalidRefFormat { message } } }";

/// GraphQL request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest<'a> {
    pub operation_name: &'a str,
    pub query: &'a str,
    pub variables: RefVariables<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefVariables<'a> {
    #[serde(rename = "ref")]
    pub graph_ref: &'a str,
}

/// Top-level GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantResponse {
    #[serde(default)]
    pub data: Option<VariantData>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantData {
    /// `null` when the graph ref names no variant.
    pub variant: Option<Variant>,
}

/// Either a `GraphVariant` or an `InvalidRefFormat`.
#[derive(Debug, Clone, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub subgraphs: Option<Vec<SubgraphUrl>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubgraphUrl {
    pub name: String,
    /// Studio reports `null` for subgraphs published without a routing URL.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}
