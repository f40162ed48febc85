//! Subgraph and supergraph entities.
//!
//! Entities are rebuilt from the declaration file on every read; only their
//! run state and url mode survive between reads, via [`crate::SessionStore`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::routing::SubgraphRouting;

/// Reserved supergraph name aggregating every declared subgraph.
pub const ALL_SUPERGRAPH: &str = "All";

/// Which of a subgraph's two URLs is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlMode {
    Local,
    #[default]
    Remote,
}

impl UrlMode {
    /// Short label shown next to a subgraph.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Remote => "Apollo",
        }
    }

    /// Key holding this URL in the declaration file.
    pub const fn declaration_key(self) -> &'static str {
        match self {
            Self::Local => "localUrl",
            Self::Remote => "devUrl",
        }
    }
}

impl fmt::Display for UrlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for UrlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "localurl" => Ok(Self::Local),
            "remote" | "dev" | "devurl" | "apollo" => Ok(Self::Remote),
            other => Err(format!("unknown url mode '{other}', expected local or remote")),
        }
    }
}

/// Whether an entity is believed to be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// An independently runnable service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subgraph {
    pub name: String,
    pub url_mode: UrlMode,
    pub local_url: String,
    pub remote_url: String,
    /// Absolute path to the sources; `None` when the user runs it by hand.
    pub file_path: Option<PathBuf>,
    pub run_state: RunState,
}

impl Subgraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_mode: UrlMode::default(),
            local_url: String::new(),
            remote_url: String::new(),
            file_path: None,
            run_state: RunState::default(),
        }
    }

    /// The URL selected by the current url mode.
    pub fn url(&self) -> &str {
        match self.url_mode {
            UrlMode::Local => &self.local_url,
            UrlMode::Remote => &self.remote_url,
        }
    }

    pub const fn is_managed(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Port of the local URL, falling back to the scheme default.
    pub fn local_port(&self) -> Option<u16> {
        url::Url::parse(&self.local_url)
            .ok()
            .and_then(|u| u.port_or_known_default())
    }

    fn parsed_local_host(&self) -> String {
        url::Url::parse(&self.local_url)
            .ok()
            .and_then(|u| {
                u.host().map(|host| match host {
                    url::Host::Domain(domain) => domain.to_owned(),
                    url::Host::Ipv4(addr) => addr.to_string(),
                    url::Host::Ipv6(addr) => addr.to_string(),
                })
            })
            .unwrap_or_default()
    }

    /// `true` when the local URL names `localhost`, which may resolve to
    /// either loopback.
    pub fn is_localhost(&self) -> bool {
        matches!(self.parsed_local_host().as_str(), "" | "localhost")
    }

    /// Bindable host of the local URL; `localhost` maps to the IPv4 loopback.
    pub fn local_host(&self) -> String {
        if self.is_localhost() {
            "127.0.0.1".to_owned()
        } else {
            self.parsed_local_host()
        }
    }

    /// Routing entry for this subgraph in the composed document.
    pub fn routing_block(&self, authorization: Option<&str>) -> SubgraphRouting {
        SubgraphRouting::new(self.url(), authorization)
    }

    /// Name of the terminal running `rover dev` for this subgraph alone.
    pub fn control_terminal(&self) -> String {
        format!("Rover {}", self.name)
    }

    pub fn descriptor(&self) -> EntityDescriptor {
        EntityDescriptor {
            label: self.name.clone(),
            description: Some(self.url_mode.label().to_owned()),
            context_value: match self.run_state {
                RunState::Running => "RunningSubgraph",
                RunState::Stopped => "StoppedSubgraph",
            },
            tooltip: self.file_path.as_ref().map(|p| p.display().to_string()),
            collapsible: false,
        }
    }
}

/// A named composition of subgraphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supergraph {
    pub name: String,
    /// Member subgraph names; every declared subgraph for [`ALL_SUPERGRAPH`].
    pub members: Vec<String>,
    /// Resolved members, filled in by child resolution.
    pub children: Vec<Subgraph>,
    pub run_state: RunState,
}

impl Supergraph {
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
            children: Vec::new(),
            run_state: RunState::default(),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.name == ALL_SUPERGRAPH
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// The supergraph followed by its resolved children, in display order.
    pub fn entities(&self) -> impl Iterator<Item = Entity<'_>> {
        std::iter::once(Entity::Supergraph(self))
            .chain(self.children.iter().map(Entity::Subgraph))
    }

    pub fn descriptor(&self) -> EntityDescriptor {
        EntityDescriptor {
            label: self.name.clone(),
            description: None,
            context_value: match self.run_state {
                RunState::Running => "RunningSupergraph",
                RunState::Stopped => "StoppedSupergraph",
            },
            tooltip: None,
            collapsible: true,
        }
    }
}

/// Presentation node: either kind of entity, borrowed from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity<'a> {
    Subgraph(&'a Subgraph),
    Supergraph(&'a Supergraph),
}

impl<'a> Entity<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Self::Subgraph(s) => &s.name,
            Self::Supergraph(s) => &s.name,
        }
    }

    pub const fn run_state(&self) -> RunState {
        match self {
            Self::Subgraph(s) => s.run_state,
            Self::Supergraph(s) => s.run_state,
        }
    }

    pub fn descriptor(&self) -> EntityDescriptor {
        match self {
            Self::Subgraph(s) => s.descriptor(),
            Self::Supergraph(s) => s.descriptor(),
        }
    }
}

/// What the presentation layer needs to draw one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub label: String,
    pub description: Option<String>,
    pub context_value: &'static str,
    pub tooltip: Option<String>,
    pub collapsible: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn subgraph() -> Subgraph {
        Subgraph {
            local_url: "http://localhost:4001/graphql".into(),
            remote_url: "https://users.example.com/graphql".into(),
            ..Subgraph::new("users")
        }
    }

    #[test]
    fn url_follows_mode() {
        let mut sg = subgraph();
        assert_eq!(sg.url(), "https://users.example.com/graphql");
        sg.url_mode = UrlMode::Local;
        assert_eq!(sg.url(), "http://localhost:4001/graphql");
    }

    #[test]
    fn local_port_and_host() {
        let sg = subgraph();
        assert_eq!(sg.local_port(), Some(4001));
        assert_eq!(sg.local_host(), "127.0.0.1");
        assert!(sg.is_localhost());
    }

    #[test]
    fn ipv6_local_host_drops_brackets() {
        let sg = Subgraph {
            local_url: "http://[::1]:4001/graphql".into(),
            ..Subgraph::new("x")
        };
        assert_eq!(sg.local_host(), "::1");
        assert!(!sg.is_localhost());
    }

    #[test]
    fn local_port_defaults_to_scheme() {
        let sg = Subgraph {
            local_url: "http://devbox/graphql".into(),
            ..Subgraph::new("x")
        };
        assert_eq!(sg.local_port(), Some(80));
        assert_eq!(sg.local_host(), "devbox");
        assert!(!sg.is_localhost());
    }

    #[test]
    fn unparsable_local_url_has_no_port() {
        let sg = Subgraph::new("x");
        assert_eq!(sg.local_port(), None);
    }

    #[test]
    fn url_mode_parses_aliases() {
        assert_eq!("local".parse::<UrlMode>().unwrap(), UrlMode::Local);
        assert_eq!("devUrl".parse::<UrlMode>().unwrap(), UrlMode::Remote);
        assert!("elsewhere".parse::<UrlMode>().is_err());
    }

    #[test]
    fn descriptors_carry_context_values() {
        let mut sg = subgraph();
        assert_eq!(sg.descriptor().context_value, "StoppedSubgraph");
        assert_eq!(sg.descriptor().description.as_deref(), Some("Apollo"));
        sg.run_state = RunState::Running;
        assert_eq!(Entity::Subgraph(&sg).descriptor().context_value, "RunningSubgraph");

        let sup = Supergraph::new(ALL_SUPERGRAPH, Vec::new());
        assert!(sup.is_aggregate());
        assert!(sup.descriptor().collapsible);
        assert_eq!(Entity::Supergraph(&sup).name(), "All");
    }

    #[test]
    fn entities_list_supergraph_then_children() {
        let mut shop = Supergraph::new("shop", vec!["users".into()]);
        shop.children.push(Subgraph {
            run_state: RunState::Running,
            ..subgraph()
        });
        let entities: Vec<_> = shop.entities().collect();
        assert_eq!(entities.len(), 2);
        assert!(matches!(entities[0], Entity::Supergraph(s) if s.name == "shop"));
        assert_eq!(entities[1].name(), "users");
        assert_eq!(entities[1].run_state(), RunState::Running);
    }
}
