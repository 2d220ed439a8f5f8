//! Interactive terminal protocol: one JSON command per line on stdin, one
//! JSON result per line on stdout. The literals `status`, `stats`, and
//! `exit` are handled without going through the Dispatcher.

use crate::app::App;
use hydra_dispatcher::Command;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(app: &App, show_banner: bool) -> std::io::Result<()> {
    if show_banner {
        println!("hydra — interactive mode. One JSON command per line; 'status', 'stats', or 'exit'.");
    }

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "exit" => break,
            "status" => print_json(&status_payload(app).await),
            "stats" => print_json(&stats_payload(app).await),
            _ => match serde_json::from_str::<Command>(line) {
                Ok(command) => {
                    let result = app.dispatcher.execute(command).await;
                    print_json(&serde_json::to_value(result).unwrap_or_default());
                }
                Err(e) => print_json(&serde_json::json!({"success": false, "decision": "ERROR", "error": e.to_string()})),
            },
        }
    }

    Ok(())
}

async fn status_payload(app: &App) -> serde_json::Value {
    let heads = app.registry.get_active_heads().await;
    let limbs = app.registry.get_active_limbs().await;
    serde_json::json!({"heads": heads, "limbs": limbs})
}

async fn stats_payload(app: &App) -> serde_json::Value {
    match app.ledger.stats().await {
        Ok(stats) => serde_json::to_value(stats).unwrap_or_default(),
        Err(e) => serde_json::json!({"error": e.to_string()}),
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{value}");
    let _ = std::io::stdout().flush();
}
