//! Logging setup for the `rover-runner` binary.
//!
//! Logs go to stderr; stdout carries command output and notices.

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to `default_filter`
/// (e.g. `"rover_runner=info"`). An unparsable fallback degrades to `info`.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. `log_json` switches to one JSON object per
/// line. A subscriber installed earlier wins.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr);
    let installed = if log_json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.with_target(false).try_init()
    };
    if let Err(e) = installed {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_default_falls_back() {
        let filter = env_filter("rover_runner=[bad");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing("rover_runner=debug", false);
        init_tracing("rover_runner=debug", true);
    }
}
