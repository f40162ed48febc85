//! Interactive shell: one action per line until `quit` or end of input.
//!
//! Leaving the shell stops everything that is still running.

use std::io::{self, Write};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::commands::{self, Action};
use crate::lifecycle::{NoticeLevel, RunnerEvent};
use crate::orchestrator::Orchestrator;

const PROMPT: &str = "rover-runner> ";

#[derive(Parser, Debug)]
#[command(name = "rover-runner", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    action: Action,
}

/// What the shell does with one input line.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Quit,
    Action(Action),
    /// Help or a parse error, already rendered.
    Message(String),
}

fn parse_line(line: &str) -> Input {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => Input::Empty,
        ["quit" | "exit"] => Input::Quit,
        _ => match ShellLine::try_parse_from(words) {
            Ok(parsed) => Input::Action(parsed.action),
            Err(e) => Input::Message(e.render().to_string()),
        },
    }
}

fn label(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    }
}

/// Print notices to stdout as they arrive.
pub fn spawn_notice_printer(mut events: broadcast::Receiver<RunnerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RunnerEvent::Notice { level, message }) => {
                    let _ = writeln!(io::stdout(), "[{}] {message}", label(level));
                }
                Ok(RunnerEvent::Refresh) => debug!("refresh"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Notice printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Read actions from stdin until `quit` or EOF, then stop everything.
pub async fn run(orch: &Orchestrator) -> anyhow::Result<()> {
    let mut out = io::stdout();
    writeln!(
        out,
        "Rover Runner {}. Type `help` for commands, `quit` to stop everything and leave.",
        env!("CARGO_PKG_VERSION")
    )?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        match parse_line(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Message(text) => write!(out, "{text}")?,
            Input::Action(action) => {
                if let Err(e) = commands::execute(orch, action, &mut out).await {
                    writeln!(out, "error: {e}")?;
                }
            }
        }
    }

    if let Err(e) = orch.stop_all().await {
        writeln!(
            out,
            "Something went wrong stopping all subgraphs! Check out the logs for more info: {e}"
        )?;
    }
    Ok(())
}
