//! Integration tests for the `toolcheck` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const KEY_VAR: &str = "TOOLCHECK_IT_WEATHER_API_KEY";

fn toolcheck(dir: &Path, args: &[&str], vars: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_toolcheck"));
    command
        .args(args)
        .current_dir(dir)
        .env_remove("TOOLCHECK_CONFIG")
        .env_remove("TOOLCHECK_SKIP_SMOKE_TESTS")
        .env_remove("RUST_LOG")
        .env_remove(KEY_VAR);
    for (key, value) in vars {
        command.env(key, value);
    }
    command.output().expect("Failed to execute toolcheck")
}

fn fleet() -> TempDir {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = temp_dir.path();

    fs::write(
        root.join("toolcheck.yml"),
        "global_timeout_ms: 5000\nspecs_dir: smoke-tests\n",
    )
    .expect("write policy");

    let specs = root.join("smoke-tests");
    fs::create_dir_all(&specs).expect("create specs dir");
    fs::write(
        specs.join("weather.json"),
        format!(
            r#"{{
  "description": "Weather lookups",
  "config": {{
    "checks": [{{
      "type": "env_var",
      "name": "{KEY_VAR}",
      "error_message": "Missing {KEY_VAR}",
      "fix_suggestion": "export {KEY_VAR}=..."
    }}]
  }}
}}"#
        ),
    )
    .expect("write weather spec");
    fs::write(
        specs.join("notes.json"),
        r#"{"config": {"checks": [{"type": "env_var", "name": "TOOLCHECK_IT_UNSET_OPTIONAL", "required": false}]}}"#,
    )
    .expect("write notes spec");

    temp_dir
}

fn json_stdout(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|err| panic!("parse stdout ({err}): {stdout}"))
}

#[test]
fn test_run_reports_missing_credential() {
    let temp_dir = fleet();

    let output = toolcheck(
        temp_dir.path(),
        &["run", "--level", "config", "--format", "json"],
        &[],
    );

    assert_eq!(output.status.code(), Some(1));
    let report = json_stdout(&output);
    assert_eq!(report["total_servers"], 2);
    assert_eq!(report["tested_servers"], 2);
    assert_eq!(report["failed_tests"], 1);
    assert_eq!(report["critical_failures"][0]["server_name"], "weather");
    assert_eq!(
        report["critical_failures"][0]["fix_suggestion"],
        format!("export {KEY_VAR}=...")
    );
}

#[test]
fn test_run_passes_with_credential() {
    let temp_dir = fleet();

    let output = toolcheck(
        temp_dir.path(),
        &["run", "--level", "config", "--format", "json"],
        &[(KEY_VAR, "secret")],
    );

    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report = json_stdout(&output);
    assert_eq!(report["failed_tests"], 0);
    assert_eq!(report["passed_tests"], 1);
    assert_eq!(report["skipped_tests"], 1);
}

#[test]
fn test_run_appends_report_log() {
    let temp_dir = fleet();

    toolcheck(temp_dir.path(), &["run", "--level", "config", "weather"], &[]);

    let log = fs::read_to_string(temp_dir.path().join(".toolcheck/smoke-reports.jsonl"))
        .expect("report log");
    let entry: serde_json::Value =
        serde_json::from_str(log.lines().next().expect("one entry")).expect("parse entry");
    assert_eq!(entry["trigger"], "on_demand");
    assert_eq!(entry["report"]["total_servers"], 1);
}

#[test]
fn test_run_human_output_shows_fix() {
    let temp_dir = fleet();

    let output = toolcheck(
        temp_dir.path(),
        &["run", "--level", "config", "--color", "never", "--no-log"],
        &[],
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL"), "stdout: {stdout}");
    assert!(stdout.contains(&format!("fix: export {KEY_VAR}=...")));
    assert!(stdout.contains("1 critical configuration failure(s)."));
    assert!(!temp_dir.path().join(".toolcheck").exists());
}

#[test]
fn test_run_excluded_server_is_skipped() {
    let temp_dir = fleet();

    let output = toolcheck(
        temp_dir.path(),
        &[
            "run", "--level", "config", "--exclude", "weather", "--format", "json", "--no-log",
        ],
        &[],
    );

    assert!(output.status.success());
    let report = json_stdout(&output);
    assert_eq!(report["tested_servers"], 1);
    let weather: Vec<_> = report["results"]
        .as_array()
        .expect("results")
        .iter()
        .filter(|result| result["server_name"] == "weather")
        .collect();
    assert_eq!(weather.len(), 1);
    assert_eq!(weather[0]["status"], "skip");
}

#[test]
fn test_unknown_level_is_rejected() {
    let temp_dir = fleet();

    let output = toolcheck(temp_dir.path(), &["run", "--level", "deep"], &[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown test level"), "stderr: {stderr}");
}

#[test]
fn test_list_json() {
    let temp_dir = fleet();

    let output = toolcheck(temp_dir.path(), &["list", "--format", "json"], &[]);

    assert!(output.status.success());
    let summaries = json_stdout(&output);
    let summaries = summaries.as_array().expect("array");
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0]["server"], "notes");
    assert_eq!(summaries[1]["server"], "weather");
    assert_eq!(summaries[1]["description"], "Weather lookups");
    assert_eq!(summaries[1]["checks"]["config"], 1);
}

#[test]
fn test_boot_prints_critical_failures_to_stderr() {
    let temp_dir = fleet();

    let output = toolcheck(temp_dir.path(), &["boot"], &[]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(&format!("weather: Missing {KEY_VAR}")),
        "stderr: {stderr}"
    );
    let log = fs::read_to_string(temp_dir.path().join(".toolcheck/smoke-reports.jsonl"))
        .expect("report log");
    assert!(log.contains("\"trigger\":\"boot\""));
}

#[test]
fn test_boot_respects_skip_variable() {
    let temp_dir = fleet();

    let output = toolcheck(
        temp_dir.path(),
        &["boot"],
        &[("TOOLCHECK_SKIP_SMOKE_TESTS", "true")],
    );

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("weather: Missing"), "stderr: {stderr}");
    assert!(!temp_dir.path().join(".toolcheck").exists());
}

#[test]
fn test_invalid_policy_fails() {
    let temp_dir = fleet();
    fs::write(temp_dir.path().join("toolcheck.yml"), "max_parallel_tests: [").expect("write");

    let output = toolcheck(temp_dir.path(), &["list"], &[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load policy"), "stderr: {stderr}");
}
