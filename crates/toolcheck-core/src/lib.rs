//! # toolcheck-core
//!
//! Smoke-test orchestration for a fleet of tool-servers.
//!
//! This crate provides:
//! - Declarative per-server test specifications (config, connectivity, health)
//! - Evaluators for each check tier
//! - An orchestrator that runs servers in parallel under a global deadline
//! - Report aggregation and text rendering
//! - Boot-time and on-demand entry points
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use toolcheck_core::{Diagnostic, DiagnosticRequest, OrchestratorConfig, SpecStore, registry_for};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OrchestratorConfig::load(Path::new("toolcheck.yml"))?;
//! let store = Arc::new(SpecStore::load_dir(&config.specs_dir)?);
//! let registry = Arc::from(registry_for(&config.servers, Arc::clone(&store)));
//!
//! let response = Diagnostic::new(config, store, registry)
//!     .run(&DiagnosticRequest::default())
//!     .await;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod boot;
pub mod diagnostic;
pub mod orchestrator;
pub mod policy;
pub mod registry;
pub mod report;
pub mod report_log;
mod serde_duration;
pub mod spec;
pub mod spec_store;
pub mod suites;
pub mod testing;
mod types;

pub use boot::{BOOT_TIMEOUT_CEILING, BootCheck, BootOutcome, BootSkipReason};
pub use diagnostic::{Diagnostic, DiagnosticRequest, DiagnosticResponse};
pub use orchestrator::Orchestrator;
pub use policy::{
    CONFIG_ENV, DEFAULT_POLICY_FILE, OrchestratorConfig, PolicyError, SKIP_ENV, TestLevel,
    TestLevels, skip_requested,
};
pub use registry::{ServerRegistry, SpecCatalogRegistry, StaticRegistry, registry_for};
pub use report::{DIAGNOSTIC_OPERATION, SmokeTestReport, render_boot_summary, render_text};
pub use report_log::{ReportLog, ReportLogEntry, ReportLogError, RunTrigger};
pub use spec::{ServerSpec, SpecError};
pub use spec_store::{SpecStore, SpecSummary};
pub use suites::{CapabilityInvoker, CheckContext, Environment, InvokeError, TestSuite};
pub use types::{CheckOutcome, CheckTimer, ResultSink, TestResult, TestStatus, TestType};
