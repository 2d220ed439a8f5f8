//! Command-line surface: `hydra <subcommand> [flags]`.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "hydra", version, about = "The Hydra coordinator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit machine-readable JSON instead of formatted text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress the startup banner in interactive mode.
    #[arg(long, global = true)]
    pub no_banner: bool,

    /// Override `SCBE_URL` for this invocation.
    #[arg(long, global = true)]
    pub scbe_url: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read JSON commands from stdin, one per line, write results to stdout.
    Interactive,
    /// Print active heads and limbs.
    Status,
    /// Print ledger statistics.
    Stats,
    /// Execute a single JSON-encoded command and print the result.
    Execute {
        /// The command, as a JSON object: {"action", "target", ...}.
        json: String,
    },
    /// Workflow definition and execution.
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    /// Store a fact under `key`. `value` is parsed as JSON if possible,
    /// otherwise stored as a string.
    Remember { key: String, value: String },
    /// Retrieve a fact stored with `remember`.
    Recall { key: String },
    /// Keyword search over stored facts.
    Search { terms: Vec<String> },
    /// Run the WebSocket fanout server.
    Serve {
        #[arg(long, default_value_t = 7878)]
        port: u16,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkflowCommand {
    /// List every defined workflow.
    List,
    /// Define a new workflow from a JSON array of phase commands.
    Save { name: String, phases_json: String },
    /// Run a previously defined workflow to completion.
    Run { workflow_id: String },
    /// Show a workflow's current state.
    Show { workflow_id: String },
}
