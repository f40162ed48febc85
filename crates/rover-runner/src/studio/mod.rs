//! Apollo Studio integration.
//!
//! Provides a reqwest-based client for the Studio GraphQL API, used as the
//! remote source of subgraph URLs.

mod client;
pub mod types;


pub use client::{StudioClient, StudioError};
pub use types::{SubgraphUrl, VariantResponse};
