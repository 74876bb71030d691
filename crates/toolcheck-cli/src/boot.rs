use crate::workspace::Workspace;
use anyhow::Result;
use std::path::Path;
use toolcheck_core::BootOutcome;
use tracing::info;

/// Never fails on check results; boot must not block startup.
pub async fn execute(config_path: &Path) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let mut stderr = std::io::stderr();
    if let BootOutcome::Skipped(reason) = workspace.boot_check().run(&mut stderr).await {
        info!(?reason, "boot smoke tests skipped");
    }
    Ok(())
}
