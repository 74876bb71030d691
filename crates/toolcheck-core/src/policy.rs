//! Run policy: which levels run, how wide, and for how long.
//!
//! Loaded once per run from `toolcheck.yml` and never mutated while the
//! run is in flight. Every field is optional in the document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default policy document name.
pub const DEFAULT_POLICY_FILE: &str = "toolcheck.yml";

/// Names the policy document when no explicit path is given.
pub const CONFIG_ENV: &str = "TOOLCHECK_CONFIG";

/// Set to `true` to skip the boot-time run.
pub const SKIP_ENV: &str = "TOOLCHECK_SKIP_SMOKE_TESTS";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Which check categories a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestLevels {
    pub config: bool,
    pub connectivity: bool,
    pub health: bool,
}

impl Default for TestLevels {
    fn default() -> Self {
        Self {
            config: true,
            connectivity: true,
            health: false,
        }
    }
}

/// Cumulative depth selector for on-demand runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestLevel {
    Config,
    #[default]
    Connectivity,
    Health,
}

impl TestLevel {
    /// `connectivity` implies `config`; `health` implies both.
    pub fn levels(self) -> TestLevels {
        TestLevels {
            config: true,
            connectivity: self >= TestLevel::Connectivity,
            health: self == TestLevel::Health,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestLevel::Config => "config",
            TestLevel::Connectivity => "connectivity",
            TestLevel::Health => "health",
        }
    }
}

impl fmt::Display for TestLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "config" => Ok(TestLevel::Config),
            "connectivity" => Ok(TestLevel::Connectivity),
            "health" => Ok(TestLevel::Health),
            other => Err(format!(
                "unknown test level '{other}' (expected config, connectivity or health)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub enabled: bool,
    pub run_on_boot: bool,
    pub test_levels: TestLevels,
    pub parallel_execution: bool,
    pub max_parallel_tests: usize,
    #[serde(rename = "global_timeout_ms", with = "crate::serde_duration")]
    pub global_timeout: Duration,
    #[serde(rename = "check_timeout_ms", with = "crate::serde_duration")]
    pub check_timeout: Duration,
    #[serde(rename = "health_timeout_ms", with = "crate::serde_duration")]
    pub health_timeout: Duration,
    pub fail_fast: bool,
    pub exclude_servers: Vec<String>,
    /// Active servers. Empty means every server with a spec document.
    pub servers: Vec<String>,
    pub specs_dir: PathBuf,
    pub report_log: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_on_boot: true,
            test_levels: TestLevels::default(),
            parallel_execution: true,
            max_parallel_tests: 5,
            global_timeout: Duration::from_secs(10),
            check_timeout: crate::suites::DEFAULT_CHECK_TIMEOUT,
            health_timeout: crate::suites::DEFAULT_HEALTH_TIMEOUT,
            fail_fast: false,
            exclude_servers: Vec::new(),
            servers: Vec::new(),
            specs_dir: PathBuf::from("smoke-tests"),
            report_log: PathBuf::from(".toolcheck/smoke-reports.jsonl"),
        }
    }
}

impl OrchestratorConfig {
    /// Loads the policy at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        if !path.exists() {
            warn!(path = %path.display(), "policy file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, PolicyError> {
        // An empty document deserializes to unit, not a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| PolicyError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of servers allowed in flight at once.
    pub fn effective_concurrency(&self) -> usize {
        if self.parallel_execution {
            self.max_parallel_tests.max(1)
        } else {
            1
        }
    }

    pub fn is_excluded(&self, server: &str) -> bool {
        self.exclude_servers.iter().any(|name| name == server)
    }

    /// Resolves relative `specs_dir` and `report_log` against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if self.specs_dir.is_relative() {
            self.specs_dir = base.join(&self.specs_dir);
        }
        if self.report_log.is_relative() {
            self.report_log = base.join(&self.report_log);
        }
        self
    }
}

/// Whether the boot run is disabled by `TOOLCHECK_SKIP_SMOKE_TESTS`.
pub fn skip_requested(value: Option<&str>) -> bool {
    value.is_some_and(|value| {
        let value = value.trim();
        value.eq_ignore_ascii_case("true") || value == "1"
    })
}
