use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use certificate_monkey_infra::{ApplyState, ResourceGraph};

#[derive(Debug, Parser)]
#[command(
    name = "certificate-monkey-infra",
    version,
    about = "Declares the AWS resources backing Certificate Monkey"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the resource graph as a JSON document (default)
    Synth,
    /// Print a human-readable summary
    Info,
    /// Print the exported outputs, still deferred
    Outputs,
    /// Print the outputs resolved from an apply state file
    Resolve {
        /// Apply state JSON written by the provisioning engine
        state: PathBuf,
    },
    /// Print the IAM policy JSON resolved from an apply state file
    Policy {
        /// Apply state JSON written by the provisioning engine
        state: PathBuf,
    },
    /// Print the application environment variables as `.env` lines
    Env {
        /// Apply state JSON; the variables are known without one
        state: Option<PathBuf>,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Synth)
    }
}

/// Runs one command against the declared graph and writes its result to stdout.
pub fn run(graph: &ResourceGraph, command: &Command) -> Result<()> {
    let output = render(graph, command)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn render(graph: &ResourceGraph, command: &Command) -> Result<String> {
    Ok(match command {
        Command::Synth => serde_json::to_string_pretty(&graph.to_document()?)? + "\n",
        Command::Info => graph.summary(),
        Command::Outputs => serde_json::to_string_pretty(&graph.outputs)? + "\n",
        Command::Resolve { state } => {
            let state = load_state(state)?;
            serde_json::to_string_pretty(&graph.outputs.resolve(&state)?)? + "\n"
        }
        Command::Policy { state } => {
            let state = load_state(state)?;
            serde_json::to_string_pretty(&graph.policy.document().render(&state)?)? + "\n"
        }
        Command::Env { state } => {
            let state = match state {
                Some(path) => load_state(path)?,
                None => ApplyState::new(),
            };
            graph
                .outputs
                .environment_variables
                .resolve(&state)?
                .to_dotenv()
        }
    })
}

fn load_state(path: &Path) -> Result<ApplyState> {
    let state = ApplyState::from_file(path)?;
    info!(path = %path.display(), "Apply state loaded");
    Ok(state)
}
