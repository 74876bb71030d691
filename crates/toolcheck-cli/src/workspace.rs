//! Loading the policy, spec documents and registry for a command.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use toolcheck_core::{
    BootCheck, Diagnostic, OrchestratorConfig, SKIP_ENV, ServerRegistry, SpecStore, registry_for,
    skip_requested,
};
use tracing::debug;

pub struct Workspace {
    pub config: OrchestratorConfig,
    pub store: Arc<SpecStore>,
    pub registry: Arc<dyn ServerRegistry>,
}

impl Workspace {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = OrchestratorConfig::load(config_path)
            .with_context(|| format!("Failed to load policy from {}", config_path.display()))?;

        let base = config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let config = config.resolve_paths(base);

        let store = SpecStore::load_dir(&config.specs_dir).with_context(|| {
            format!(
                "Failed to load test specifications from {}",
                config.specs_dir.display()
            )
        })?;
        debug!(
            specs = store.servers().len(),
            dir = %config.specs_dir.display(),
            "loaded test specifications"
        );

        let store = Arc::new(store);
        let registry: Arc<dyn ServerRegistry> =
            Arc::from(registry_for(&config.servers, Arc::clone(&store)));

        Ok(Self {
            config,
            store,
            registry,
        })
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::new(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
        )
    }

    pub fn boot_check(&self) -> BootCheck {
        let skip = skip_requested(std::env::var(SKIP_ENV).ok().as_deref());
        BootCheck::new(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
        )
        .with_skip_override(skip)
    }
}
