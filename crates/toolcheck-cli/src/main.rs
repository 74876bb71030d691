//! # toolcheck-cli
//!
//! Binary entry point for toolcheck.
//!
//! This crate provides:
//! - `toolcheck run` for on-demand smoke tests
//! - `toolcheck boot` for the compact startup check
//! - `toolcheck list` to show which checks each server declares
//! - `toolcheck mcp` to serve diagnostics to agents over stdio

mod boot;
mod list;
mod mcp;
mod run;
mod workspace;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{IsTerminal, stdout};
use std::path::PathBuf;
use toolcheck_core::{CONFIG_ENV, DEFAULT_POLICY_FILE};
use tracing_subscriber::EnvFilter;

/// Color output mode for terminal display.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Automatically detect if stdout is a TTY
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorMode {
    /// Returns true if colors should be used based on mode and terminal detection.
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// Output format shared by `run` and `list`.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Smoke tests for tool-server fleets.
#[derive(Parser, Debug)]
#[command(name = "toolcheck", version, about)]
struct Cli {
    /// Policy file (YAML). Relative spec and log paths resolve against its directory.
    #[arg(short, long, env = CONFIG_ENV, default_value = DEFAULT_POLICY_FILE, global = true)]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run smoke tests now and print the report
    Run(run::RunArgs),

    /// Run the startup check and print only critical problems
    Boot,

    /// List servers and the checks declared for them
    List(list::ListArgs),

    /// Serve diagnostics over MCP on stdio
    Mcp(mcp::McpArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let use_colors = cli.color.should_use_colors();
    colored::control::set_override(use_colors);

    match cli.command {
        Commands::Run(args) => run::execute(&cli.config, args, use_colors).await,
        Commands::Boot => boot::execute(&cli.config).await,
        Commands::List(args) => list::execute(&cli.config, args),
        Commands::Mcp(args) => mcp::execute(&cli.config, args).await,
    }
}
