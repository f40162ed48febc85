//! Rover Runner Core Library
//!
//! Shared functionality for Rover Runner components:
//! - Subgraph/supergraph declarations and path resolution
//! - Layered settings resolution
//! - Entity model and session-scoped run state
//! - Router routing document generation
//! - Common error types

pub mod declaration;
pub mod error;
pub mod model;
pub mod remote;
pub mod routing;
pub mod session;
pub mod settings;
pub mod template;
pub mod tracing_init;
pub mod workspace;

pub use declaration::{ConfigStore, Declaration, SubgraphDeclaration};
pub use error::{Error, Result};
pub use model::{ALL_SUPERGRAPH, Entity, EntityDescriptor, RunState, Subgraph, Supergraph, UrlMode};
pub use remote::{RemoteUrls, UrlLookup};
pub use routing::{RoutingConfig, RoutingConfigWriter, SubgraphRouting};
pub use session::SessionStore;
pub use settings::Settings;
pub use workspace::Workspace;
