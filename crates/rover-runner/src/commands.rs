//! Lifecycle subcommands shared by the one-shot CLI and the shell.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::Write;

use clap::Subcommand;
use rover_runner_core::{Entity, Supergraph, UrlMode};

use crate::orchestrator::Orchestrator;
use crate::prompt;

/// Rover Runner actions.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create .rover-runner/ with a sample declaration
    Init,
    /// List supergraphs and their subgraphs
    List,
    /// Run a single subgraph behind `rover dev`
    Run {
        /// Subgraph name
        subgraph: String,
        /// Start the subgraph under the debugger
        #[arg(long, conflicts_with = "normal")]
        debug: bool,
        /// Start the subgraph without asking about the debugger
        #[arg(long)]
        normal: bool,
        /// Use the local url for this run
        #[arg(long)]
        local: bool,
    },
    /// Stop a single subgraph
    Stop {
        /// Subgraph name
        subgraph: String,
    },
    /// Run every subgraph of a supergraph and compose them
    Up {
        /// Supergraph name ("All" for every declared subgraph)
        supergraph: String,
        /// Start local subgraphs under the debugger
        #[arg(long)]
        debug: bool,
        /// Subgraphs to run from their local url (comma separated)
        #[arg(long, value_delimiter = ',')]
        local: Vec<String>,
    },
    /// Stop a supergraph and its subgraphs
    Down {
        /// Supergraph name
        supergraph: String,
    },
    /// Stop everything Rover Runner started
    StopAll,
    /// Choose the local or remote url of a subgraph
    UseUrl {
        /// Subgraph name
        subgraph: String,
        /// local or remote
        mode: UrlMode,
    },
    /// Change the local or remote url of a subgraph in the declaration
    SetUrl {
        /// Subgraph name
        subgraph: String,
        /// local or remote
        mode: UrlMode,
        /// New url
        url: String,
    },
}

impl Action {
    /// Actions that leave processes running after they return.
    pub const fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Run { .. } | Self::Up { .. })
    }

    /// Actions whose effect ends with the process.
    pub const fn is_session_only(&self) -> bool {
        matches!(self, Self::UseUrl { .. })
    }
}

/// Message for session-only actions given outside the shell.
pub const SESSION_ONLY_HINT: &str = "use-url only lasts for the current session. \
Pass --local to run or up, or use it inside the interactive shell.";

/// Text lines for `list`.
pub fn render_tree(tree: &[Supergraph]) -> Vec<String> {
    tree.iter()
        .flat_map(Supergraph::entities)
        .map(render_entity)
        .collect()
}

fn render_entity(entity: Entity<'_>) -> String {
    let descriptor = entity.descriptor();
    match entity {
        Entity::Supergraph(supergraph) => {
            let mut line = format!("{} [{}]", descriptor.label, entity.run_state());
            if supergraph.is_aggregate() {
                line.push_str(" (every declared subgraph)");
            }
            line
        }
        Entity::Subgraph(child) => {
            let mut line = format!(
                "  {:<24} {:<7} {:<8} {}",
                descriptor.label,
                descriptor.description.unwrap_or_default(),
                entity.run_state(),
                child.url()
            );
            if let Some(path) = descriptor.tooltip {
                line.push_str(&format!("  ({path})"));
            }
            line.trim_end().to_owned()
        }
    }
}

async fn wants_debug(orch: &Orchestrator, subgraph: &str, debug: bool, normal: bool) -> anyhow::Result<bool> {
    if debug || normal {
        return Ok(debug);
    }
    let entity = orch.find_subgraph(subgraph).await?;
    if entity.url_mode == UrlMode::Local && entity.is_managed() {
        return tokio::task::spawn_blocking(prompt::choose_debug).await?;
    }
    Ok(false)
}

/// Execute one action.
pub async fn execute(orch: &Orchestrator, action: Action, out: &mut impl Write) -> anyhow::Result<()> {
    match action {
        Action::Init => match orch.init().await? {
            Some(path) => writeln!(out, "Wrote sample declaration to {}", path.display())?,
            None => writeln!(out, "Declaration already exists, nothing to do.")?,
        },
        Action::List => {
            let tree = orch.tree().await?;
            if tree.is_empty() {
                writeln!(out, "No supergraphs found.")?;
            }
            for line in render_tree(&tree) {
                writeln!(out, "{line}")?;
            }
        }
        Action::Run {
            subgraph,
            debug,
            normal,
            local,
        } => {
            if local {
                orch.use_url(&subgraph, UrlMode::Local).await?;
            }
            let debug = wants_debug(orch, &subgraph, debug, normal).await?;
            let name = orch.run_subgraph(&subgraph, debug).await?;
            writeln!(out, "Running {name}")?;
        }
        Action::Stop { subgraph } => {
            let name = orch.stop_subgraph(&subgraph).await?;
            writeln!(out, "Stopped {name}")?;
        }
        Action::Up {
            supergraph,
            debug,
            local,
        } => {
            for subgraph in &local {
                orch.use_url(subgraph, UrlMode::Local).await?;
            }
            let name = orch.run_supergraph(&supergraph, debug).await?;
            writeln!(out, "Running {name} supergraph")?;
        }
        Action::Down { supergraph } => {
            let name = orch.stop_supergraph(&supergraph).await?;
            writeln!(out, "Stopped {name} supergraph")?;
        }
        Action::StopAll => {
            orch.stop_all().await?;
            writeln!(out, "Stopped all subgraphs")?;
        }
        Action::UseUrl { subgraph, mode } => {
            orch.use_url(&subgraph, mode).await?;
            writeln!(out, "{subgraph} now uses its {mode} url")?;
        }
        Action::SetUrl {
            subgraph,
            mode,
            url,
        } => {
            orch.set_url(&subgraph, mode, &url).await?;
            writeln!(out, "Set {mode} url of {subgraph} to {url}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use clap::Parser;
    use rover_runner_core::{ALL_SUPERGRAPH, RunState, Subgraph};

    #[derive(Parser, Debug)]
    #[command(no_binary_name = true)]
    struct Line {
        #[command(subcommand)]
        action: Action,
    }

    fn parse(words: &[&str]) -> Action {
        Line::try_parse_from(words.iter().copied()).unwrap().action
    }

    #[test]
    fn parses_url_modes() {
        assert_eq!(
            parse(&["use-url", "users", "local"]),
            Action::UseUrl {
                subgraph: "users".into(),
                mode: UrlMode::Local,
            }
        );
        assert!(Line::try_parse_from(["use-url", "users", "sideways"]).is_err());
    }

    #[test]
    fn debug_and_normal_conflict() {
        assert!(Line::try_parse_from(["run", "users", "--debug", "--normal"]).is_err());
        assert!(parse(&["run", "users", "--debug"]).is_lifecycle());
        assert!(!parse(&["stop-all"]).is_lifecycle());
    }

    #[test]
    fn render_tree_shows_state_and_mode() {
        let mut shop = Supergraph::new("shop", vec!["users".into()]);
        shop.children.push(Subgraph {
            remote_url: "https://users.remote/graphql".into(),
            run_state: RunState::Running,
            ..Subgraph::new("users")
        });
        let lines = render_tree(&[shop]);
        assert_eq!(lines[0], "shop [stopped]");
        assert!(lines[1].contains("users"));
        assert!(lines[1].contains("Apollo"));
        assert!(lines[1].contains("running"));
        assert!(lines[1].ends_with("https://users.remote/graphql"));
    }

    #[test]
    fn render_tree_marks_the_aggregate() {
        let lines = render_tree(&[Supergraph::new(ALL_SUPERGRAPH, Vec::new())]);
        assert_eq!(lines, vec!["All [stopped] (every declared subgraph)"]);
    }

    #[test]
    fn up_takes_comma_separated_local_subgraphs() {
        assert_eq!(
            parse(&["up", "shop", "--local", "users,reviews"]),
            Action::Up {
                supergraph: "shop".into(),
                debug: false,
                local: vec!["users".into(), "reviews".into()],
            }
        );
        assert!(parse(&["use-url", "users", "local"]).is_session_only());
        assert!(!parse(&["run", "users"]).is_session_only());
    }

    #[tokio::test]
    async fn run_local_switches_url_mode_before_starting() {
        let fx = Fixture::new();
        let orch = Orchestrator::new(fx.runtime());
        let mut out = Vec::new();
        execute(&orch, parse(&["run", "users", "--normal", "--local"]), &mut out)
            .await
            .unwrap();
        let session = orch.runtime().session();
        assert_eq!(session.url_mode("users").await, UrlMode::Local);
        assert_eq!(session.subgraph_state("users").await, RunState::Running);
        assert!(fx.terminals.sent("users").await.contains(&"npm run start".to_string()));
        assert!(fx.introspector.calls().await[0].url.starts_with("http://localhost:4001"));
    }

    #[tokio::test]
    async fn up_local_rejects_unknown_subgraph() {
        let fx = Fixture::new();
        let orch = Orchestrator::new(fx.runtime());
        let mut out = Vec::new();
        let err = execute(&orch, parse(&["up", "shop", "--local", "ghost"]), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(!orch.is_locked());
    }

    #[tokio::test]
    async fn execute_writes_user_output() {
        let fx = Fixture::new();
        let orch = Orchestrator::new(fx.runtime());
        let mut out = Vec::new();
        execute(&orch, parse(&["run", "users", "--normal"]), &mut out)
            .await
            .unwrap();
        execute(&orch, parse(&["list"]), &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Running users\n"));
        assert!(text.contains("All [stopped]"));
    }
}
