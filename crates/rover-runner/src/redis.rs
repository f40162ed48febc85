//! Optional `redis-server` sidecar run in its own terminal.

use std::time::Duration;

use tracing::{debug, info};

use crate::health::is_port_free;
use crate::terminal::{self, TerminalError, TerminalHost};

pub const REDIS_TERMINAL: &str = "Redis";
pub const REDIS_PORT: u16 = 6379;

/// Start `redis-server` unless something already holds the redis port.
///
/// Returns `true` when a server was launched.
pub async fn start(host: &dyn TerminalHost) -> Result<bool, TerminalError> {
    if !is_port_free("127.0.0.1", REDIS_PORT).await {
        debug!(port = REDIS_PORT, "Redis port in use, not starting redis-server");
        return Ok(false);
    }
    host.open(REDIS_TERMINAL).await?;
    host.send_text(REDIS_TERMINAL, "redis-server").await?;
    info!("Started redis-server");
    Ok(true)
}

/// Interrupt and dispose the redis terminal, if any.
pub async fn stop(host: &dyn TerminalHost, grace: Duration) -> Result<(), TerminalError> {
    terminal::release(host, REDIS_TERMINAL, grace).await
}
