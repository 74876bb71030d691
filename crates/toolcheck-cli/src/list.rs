use crate::OutputFormat;
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use toolcheck_core::SpecSummary;

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only list these servers
    #[arg(value_name = "SERVER")]
    pub servers: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

pub fn execute(config_path: &Path, args: ListArgs) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let servers = if args.servers.is_empty() {
        workspace.registry.active_servers()
    } else {
        args.servers
    };
    let summaries: Vec<SpecSummary> = servers
        .iter()
        .map(|server| workspace.store.summary(server))
        .collect();

    match args.format {
        OutputFormat::Human => print_table(&summaries),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summaries)
                .context("Failed to serialize spec summaries")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn print_table(summaries: &[SpecSummary]) {
    if summaries.is_empty() {
        println!("No active servers.");
        return;
    }

    let width = summaries
        .iter()
        .map(|summary| summary.server.len())
        .max()
        .unwrap_or(6)
        .max(6);

    println!(
        "{:<width$}  {:>6}  {:>12}  {:>6}  NOTE",
        "SERVER", "CONFIG", "CONNECTIVITY", "HEALTH"
    );
    for summary in summaries {
        let note = if let Some(err) = &summary.load_error {
            format!("failed to load: {err}")
        } else if summary.missing {
            "no specification".to_string()
        } else {
            summary.cost_warnings.join("; ")
        };
        println!(
            "{:<width$}  {:>6}  {:>12}  {:>6}  {note}",
            summary.server,
            summary.checks.config,
            summary.checks.connectivity,
            summary.checks.health
        );
    }
}
