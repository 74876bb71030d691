//! MCP tool parameter definitions.
//!
//! The `schemars` descriptions are what agents see when choosing tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use toolcheck_core::{DiagnosticRequest, SpecSummary, TestLevel};

/// Parameters for the run_smoke_tests tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunSmokeTestsParams {
    #[schemars(
        description = "How deep to test: 'config' (env vars and files only), \
        'connectivity' (config plus network reachability, the default) or 'health' \
        (everything, including tool invocations that may consume API credits)."
    )]
    #[serde(default)]
    pub test_level: Option<String>,

    #[schemars(description = "Servers to test. Defaults to every active server.")]
    #[serde(default)]
    pub servers: Option<Vec<String>>,

    #[schemars(description = "Servers to leave out, in addition to the configured exclusions.")]
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    #[schemars(description = "Overall time limit in seconds. Defaults to the configured global timeout.")]
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl RunSmokeTestsParams {
    pub fn into_request(self) -> Result<DiagnosticRequest, String> {
        let test_level = match self.test_level.as_deref() {
            None | Some("") => TestLevel::default(),
            Some(level) => level.parse()?,
        };
        Ok(DiagnosticRequest {
            test_level,
            servers: self.servers.unwrap_or_default(),
            exclude: self.exclude.unwrap_or_default(),
            timeout_seconds: self.timeout_seconds,
        })
    }
}

/// Parameters for the list_smoke_specs tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListSpecsParams {
    #[schemars(description = "Only list these servers. Defaults to every active server.")]
    #[serde(default)]
    pub servers: Option<Vec<String>>,
}

pub(crate) fn render_listing(summaries: &[SpecSummary]) -> String {
    if summaries.is_empty() {
        return "No servers are active and no test specifications were found.".to_string();
    }

    let mut out = String::from("Smoke test specifications:\n\n");
    for summary in summaries {
        let _ = write!(out, "- **{}**", summary.server);
        if let Some(description) = &summary.description {
            let _ = write!(out, " ({description})");
        }
        out.push('\n');

        if let Some(err) = &summary.load_error {
            let _ = writeln!(out, "  Failed to load: {err}");
        } else if summary.missing {
            out.push_str("  No specification; nothing is tested.\n");
        } else {
            let _ = writeln!(
                out,
                "  Checks: {} config, {} connectivity, {} health",
                summary.checks.config, summary.checks.connectivity, summary.checks.health
            );
            for cost in &summary.cost_warnings {
                let _ = writeln!(out, "  Cost: {cost}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolcheck_core::spec::CheckCounts;

    #[test]
    fn empty_params_default_to_connectivity() {
        let request = RunSmokeTestsParams::default().into_request().unwrap();
        assert_eq!(request, DiagnosticRequest::default());
    }

    #[test]
    fn params_map_onto_request() {
        let params: RunSmokeTestsParams = serde_json::from_value(serde_json::json!({
            "test_level": "health",
            "servers": ["time"],
            "exclude": ["docker"],
            "timeout_seconds": 20
        }))
        .unwrap();

        let request = params.into_request().unwrap();
        assert_eq!(request.test_level, TestLevel::Health);
        assert_eq!(request.servers, vec!["time"]);
        assert_eq!(request.exclude, vec!["docker"]);
        assert_eq!(request.timeout_seconds, Some(20));
    }

    #[test]
    fn unknown_level_is_rejected() {
        let params = RunSmokeTestsParams {
            test_level: Some("exhaustive".to_string()),
            ..RunSmokeTestsParams::default()
        };
        assert!(params.into_request().unwrap_err().contains("exhaustive"));
    }

    #[test]
    fn listing_shows_counts_and_problems() {
        let summaries = vec![
            SpecSummary {
                server: "time".to_string(),
                description: Some("Clock".to_string()),
                checks: CheckCounts {
                    config: 1,
                    connectivity: 2,
                    health: 1,
                },
                cost_warnings: vec!["free".to_string()],
                missing: false,
                load_error: None,
            },
            SpecSummary {
                server: "github".to_string(),
                description: None,
                checks: CheckCounts::default(),
                cost_warnings: Vec::new(),
                missing: false,
                load_error: Some("bad json".to_string()),
            },
        ];

        let text = render_listing(&summaries);
        assert!(text.contains("- **time** (Clock)"));
        assert!(text.contains("Checks: 1 config, 2 connectivity, 1 health"));
        assert!(text.contains("Cost: free"));
        assert!(text.contains("Failed to load: bad json"));
    }
}
