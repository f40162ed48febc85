//! Liveness checks for locally started subgraphs.

use std::sync::Arc;

use async_trait::async_trait;
use rover_runner_core::Subgraph;
use rover_runner_core::settings::HealthCheckKind;
use tokio::net::TcpListener;
use tracing::debug;

/// Result of probing a subgraph's local port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Listening,
    NotListening,
}

/// Decides whether a locally started subgraph came up.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn probe(&self, subgraph: &Subgraph) -> Liveness;
}

/// Binds the local URL's host and port. A successful bind means nothing is
/// listening there.
///
/// Only detects that *something* holds the port, not that it is the
/// expected subgraph.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortProbe;

#[async_trait]
impl HealthCheck for PortProbe {
    async fn probe(&self, subgraph: &Subgraph) -> Liveness {
        let Some(port) = subgraph.local_port() else {
            debug!(subgraph = %subgraph.name, url = %subgraph.local_url, "No port in local url");
            return Liveness::NotListening;
        };
        let host = subgraph.local_host();
        let free = is_port_free(&host, port).await
            && !(subgraph.is_localhost() && is_port_in_use(IPV6_LOOPBACK, port).await);
        if free {
            debug!(subgraph = %subgraph.name, %host, port, "Port is free");
            Liveness::NotListening
        } else {
            debug!(subgraph = %subgraph.name, %host, port, "Port is taken");
            Liveness::Listening
        }
    }
}

/// Assumes the subgraph is up once the settle delay has elapsed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SettleDelay;

#[async_trait]
impl HealthCheck for SettleDelay {
    async fn probe(&self, _subgraph: &Subgraph) -> Liveness {
        Liveness::Listening
    }
}

pub fn from_settings(kind: HealthCheckKind) -> Arc<dyn HealthCheck> {
    match kind {
        HealthCheckKind::Port => Arc::new(PortProbe),
        HealthCheckKind::Delay => Arc::new(SettleDelay),
    }
}

const IPV6_LOOPBACK: &str = "::1";

/// `true` when `host:port` can be bound right now.
pub async fn is_port_free(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).await.is_ok()
}

/// `true` only when binding fails because something holds the address.
/// Hosts without that address family do not count as taken.
async fn is_port_in_use(host: &str, port: u16) -> bool {
    matches!(
        TcpListener::bind((host, port)).await,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse
    )
}
