//! Per-server test specification lookup.
//!
//! The store is loaded once per run and is read-only afterwards. Lookups
//! never touch the network or the filesystem; they only turn loaded
//! documents into runnable suites.

use crate::spec::{CheckCounts, ServerSpec, SpecCatalog, SpecError};
use crate::suites::{CheckContext, ConfigTestSuite, ConnectivityTestSuite, HealthTestSuite};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// File name of the optional multi-server catalog inside a specs directory.
pub const CATALOG_FILE: &str = "catalog.json";

/// What is known about one server's spec, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecSummary {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub checks: CheckCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cost_warnings: Vec<String>,
    /// No document exists for this server.
    pub missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SpecStore {
    specs: BTreeMap<String, ServerSpec>,
    load_errors: BTreeMap<String, String>,
}

impl SpecStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `<server>.json` plus an optional `catalog.json` from `dir`.
    ///
    /// A missing directory yields an empty store. A malformed per-server
    /// document is kept as a load error for that server only; a malformed
    /// catalog aborts the load.
    pub fn load_dir(dir: &Path) -> Result<Self, SpecError> {
        let mut store = Self::new();
        if !dir.exists() {
            warn!(dir = %dir.display(), "test specification directory not found");
            return Ok(store);
        }

        let catalog_path = dir.join(CATALOG_FILE);
        if catalog_path.exists() {
            let content = read(&catalog_path)?;
            store.merge_catalog(&content, &catalog_path.display().to_string())?;
        }

        let entries = fs::read_dir(dir).map_err(|source| SpecError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path.file_name().is_some_and(|name| name != CATALOG_FILE)
            })
            .collect();
        paths.sort();

        for path in paths {
            let Some(server) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let origin = path.display().to_string();
            let loaded = read(&path).and_then(|content| ServerSpec::from_json(&content, &origin));
            store.record(server, loaded);
        }

        debug!(
            servers = store.specs.len(),
            errors = store.load_errors.len(),
            "loaded test specifications"
        );
        Ok(store)
    }

    /// Builds a store from a catalog document alone.
    pub fn from_catalog_str(content: &str, origin: &str) -> Result<Self, SpecError> {
        let mut store = Self::new();
        store.merge_catalog(content, origin)?;
        Ok(store)
    }

    fn merge_catalog(&mut self, content: &str, origin: &str) -> Result<(), SpecError> {
        let catalog: SpecCatalog =
            serde_json::from_str(content).map_err(|source| SpecError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        for (server, value) in catalog.servers {
            let entry_origin = format!("{origin}#{server}");
            let loaded = ServerSpec::from_value(value, &entry_origin);
            self.record(&server, loaded);
        }
        Ok(())
    }

    fn record(&mut self, server: &str, loaded: Result<ServerSpec, SpecError>) {
        match loaded {
            Ok(spec) => {
                self.load_errors.remove(server);
                self.specs.insert(server.to_string(), spec);
            }
            Err(err) => {
                warn!(server, error = %err, "test specification failed to load");
                self.specs.remove(server);
                self.load_errors.insert(server.to_string(), err.to_string());
            }
        }
    }

    pub fn insert(&mut self, server: impl Into<String>, spec: ServerSpec) {
        let server = server.into();
        self.load_errors.remove(&server);
        self.specs.insert(server, spec);
    }

    pub fn spec(&self, server: &str) -> Option<&ServerSpec> {
        self.specs.get(server)
    }

    /// Why this server's document could not be loaded, if it could not.
    pub fn load_error(&self, server: &str) -> Option<&str> {
        self.load_errors.get(server).map(String::as_str)
    }

    /// Servers with a usable spec, sorted.
    pub fn servers(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    pub fn load_errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.load_errors
            .iter()
            .map(|(server, err)| (server.as_str(), err.as_str()))
    }

    pub fn summary(&self, server: &str) -> SpecSummary {
        let spec = self.spec(server);
        SpecSummary {
            server: server.to_string(),
            description: spec.and_then(|spec| spec.description.clone()),
            checks: spec.map(ServerSpec::check_counts).unwrap_or_default(),
            cost_warnings: spec
                .map(|spec| spec.cost_warnings().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
            missing: spec.is_none() && !self.load_errors.contains_key(server),
            load_error: self.load_errors.get(server).cloned(),
        }
    }

    pub fn config_tests(&self, server: &str, ctx: &CheckContext) -> Option<ConfigTestSuite> {
        let section = self.spec(server)?.config.as_ref()?;
        Some(ConfigTestSuite::new(
            server,
            section.checks.clone(),
            section.enabled,
            ctx.env.clone(),
        ))
    }

    pub fn connectivity_tests(
        &self,
        server: &str,
        ctx: &CheckContext,
    ) -> Option<ConnectivityTestSuite> {
        let section = self.spec(server)?.connectivity.as_ref()?;
        Some(ConnectivityTestSuite::new(
            server,
            section.checks.clone(),
            section.enabled,
            ctx.http.clone(),
            ctx.check_timeout,
        ))
    }

    pub fn health_tests(&self, server: &str, ctx: &CheckContext) -> Option<HealthTestSuite> {
        let spec = self.spec(server)?;
        let section = spec.health.as_ref()?;
        Some(HealthTestSuite::new(
            server,
            section.checks.clone(),
            section.enabled,
            spec.endpoint.clone(),
            ctx.invoker.clone(),
            ctx.health_timeout,
        ))
    }
}

fn read(path: &Path) -> Result<String, SpecError> {
    fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })
}
