//! `hydra`: command-line entry point for the coordinator. Parses a
//! subcommand, bootstraps the shared Ledger/Registry/Dispatcher, and
//! either runs once, drives the interactive terminal, or starts the
//! WebSocket fanout server.

mod app;
mod cli;
mod config;
mod server;
mod terminal;

use app::App;
use cli::{Cli, Command as CliCommand, WorkflowCommand};
use clap::Parser;
use config::Config;
use hydra_dispatcher::Command as DispatchCommand;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load(cli.scbe_url.clone());
    let app = match App::bootstrap(&config).await {
        Ok(app) => Arc::new(app),
        Err(e) => {
            eprintln!("failed to start hydra: {e}");
            return ExitCode::from(2);
        }
    };

    match run(&cli, app).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hydra=debug"));
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).with(filter).init();
}

async fn run(cli: &Cli, app: Arc<App>) -> Result<(), String> {
    match &cli.command {
        CliCommand::Interactive => terminal::run(&app, !cli.no_banner).await.map_err(|e| e.to_string()),
        CliCommand::Status => {
            print_json(cli.json, &serde_json::json!({
                "heads": app.registry.get_active_heads().await,
                "limbs": app.registry.get_active_limbs().await,
            }));
            Ok(())
        }
        CliCommand::Stats => {
            let stats = app.ledger.stats().await.map_err(|e| e.to_string())?;
            print_json(cli.json, &serde_json::to_value(stats).unwrap_or_default());
            Ok(())
        }
        CliCommand::Execute { json } => {
            let command: DispatchCommand = serde_json::from_str(json).map_err(|e| format!("invalid command: {e}"))?;
            let result = app.dispatcher.execute(command).await;
            print_json(cli.json, &serde_json::to_value(&result).unwrap_or_default());
            if !result.success {
                return Err(String::new());
            }
            Ok(())
        }
        CliCommand::Workflow { command } => run_workflow(cli, &app, command).await,
        CliCommand::Remember { key, value } => {
            let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.clone()));
            app.ledger.remember(key, value, "general", 0.5).await.map_err(|e| e.to_string())?;
            print_json(cli.json, &serde_json::json!({"success": true}));
            Ok(())
        }
        CliCommand::Recall { key } => {
            let value = app.ledger.recall(key).await.map_err(|e| e.to_string())?;
            print_json(cli.json, &serde_json::json!({"key": key, "value": value}));
            Ok(())
        }
        CliCommand::Search { terms } => {
            let pattern = terms.join(" ");
            let facts = app.ledger.search_memory(Some(&pattern), None, 20).await.map_err(|e| e.to_string())?;
            print_json(cli.json, &serde_json::to_value(facts).unwrap_or_default());
            Ok(())
        }
        CliCommand::Serve { port } => server::run(app, *port).await.map_err(|e| e.to_string()),
    }
}

async fn run_workflow(cli: &Cli, app: &App, command: &WorkflowCommand) -> Result<(), String> {
    match command {
        WorkflowCommand::List => {
            let workflows = app.dispatcher.workflows().list().await;
            print_json(cli.json, &serde_json::to_value(workflows).unwrap_or_default());
            Ok(())
        }
        WorkflowCommand::Save { name, phases_json } => {
            let phases: Vec<DispatchCommand> = serde_json::from_str(phases_json).map_err(|e| format!("invalid phases: {e}"))?;
            let workflow_id = app.dispatcher.workflows().define(name.clone(), phases).await;
            print_json(cli.json, &serde_json::json!({"workflow_id": workflow_id}));
            Ok(())
        }
        WorkflowCommand::Run { workflow_id } => {
            let workflow = app
                .dispatcher
                .workflows()
                .run(workflow_id, &app.dispatcher)
                .await
                .ok_or_else(|| format!("unknown workflow '{workflow_id}'"))?;
            print_json(cli.json, &serde_json::to_value(&workflow).unwrap_or_default());
            Ok(())
        }
        WorkflowCommand::Show { workflow_id } => {
            let workflow = app.dispatcher.workflows().get(workflow_id).await.ok_or_else(|| format!("unknown workflow '{workflow_id}'"))?;
            print_json(cli.json, &serde_json::to_value(&workflow).unwrap_or_default());
            Ok(())
        }
    }
}

/// `--json` emits a single compact line for piping; the default renders
/// the same value pretty-printed for a human at a terminal.
fn print_json(json_mode: bool, value: &serde_json::Value) {
    if json_mode {
        println!("{value}");
    } else {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}
