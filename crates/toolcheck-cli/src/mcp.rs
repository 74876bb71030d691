use crate::workspace::Workspace;
use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct McpArgs {
    /// Do not run the boot check before serving
    #[arg(long)]
    pub no_boot: bool,

    /// Do not append on-demand reports to the report log
    #[arg(long)]
    pub no_log: bool,
}

pub async fn execute(config_path: &Path, args: McpArgs) -> Result<()> {
    let workspace = Workspace::load(config_path)?;

    // Boot output goes to stderr; stdout belongs to the MCP transport.
    if !args.no_boot {
        let _boot = workspace.boot_check().spawn();
    }

    let mut diagnostic = workspace.diagnostic();
    if !args.no_log {
        diagnostic = diagnostic.with_report_log();
    }
    toolcheck_mcp::serve_stdio(Arc::new(diagnostic)).await
}
