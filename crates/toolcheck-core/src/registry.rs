//! Source of the active server list.

use crate::spec_store::SpecStore;
use std::sync::Arc;

/// Decides which servers a run covers. The engine never decides this itself.
pub trait ServerRegistry: Send + Sync {
    fn active_servers(&self) -> Vec<String>;
}

/// A fixed, ordered list.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    servers: Vec<String>,
}

impl StaticRegistry {
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
        }
    }
}

impl ServerRegistry for StaticRegistry {
    fn active_servers(&self) -> Vec<String> {
        self.servers.clone()
    }
}

/// Every server that has a spec document, plus those whose document failed
/// to load so the failure is reported.
#[derive(Debug, Clone)]
pub struct SpecCatalogRegistry {
    store: Arc<SpecStore>,
}

impl SpecCatalogRegistry {
    pub fn new(store: Arc<SpecStore>) -> Self {
        Self { store }
    }
}

impl ServerRegistry for SpecCatalogRegistry {
    fn active_servers(&self) -> Vec<String> {
        let mut servers = self.store.servers();
        servers.extend(self.store.load_errors().map(|(server, _)| server.to_string()));
        servers.sort();
        servers
    }
}

/// The policy's explicit list when it has one, otherwise the spec catalog.
pub fn registry_for(servers: &[String], store: Arc<SpecStore>) -> Box<dyn ServerRegistry> {
    if servers.is_empty() {
        Box::new(SpecCatalogRegistry::new(store))
    } else {
        Box::new(StaticRegistry::new(servers.iter().cloned()))
    }
}
