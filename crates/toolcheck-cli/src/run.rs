use crate::OutputFormat;
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use std::path::Path;
use toolcheck_core::{DiagnosticRequest, SmokeTestReport, TestLevel, TestResult, TestStatus};

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Servers to test (defaults to every active server)
    #[arg(value_name = "SERVER")]
    pub servers: Vec<String>,

    /// How deep to test: config, connectivity or health
    #[arg(short, long, default_value_t = TestLevel::Connectivity)]
    pub level: TestLevel,

    /// Leave a server out (repeatable)
    #[arg(long, value_name = "SERVER", action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Overall time limit in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Do not append the report to the report log
    #[arg(long)]
    pub no_log: bool,
}

pub async fn execute(config_path: &Path, args: RunArgs, use_colors: bool) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let mut diagnostic = workspace.diagnostic();
    if !args.no_log {
        diagnostic = diagnostic.with_report_log();
    }

    let request = DiagnosticRequest {
        test_level: args.level,
        servers: args.servers,
        exclude: args.exclude,
        timeout_seconds: args.timeout,
    };
    let report = diagnostic.run(&request).await.structured;

    match args.format {
        OutputFormat::Human => print_human_report(&report, use_colors),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize smoke test report")?;
            println!("{json}");
        }
    }

    if report.has_failures() || report.timed_out {
        std::process::exit(1);
    }

    Ok(())
}

fn print_human_report(report: &SmokeTestReport, use_colors: bool) {
    let name_width = report
        .results
        .iter()
        .map(|result| result.test_name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut current_server: Option<&str> = None;
    for result in &report.results {
        if current_server != Some(result.server_name.as_str()) {
            if current_server.is_some() {
                println!();
            }
            if use_colors {
                println!("{}", result.server_name.bold());
            } else {
                println!("{}", result.server_name);
            }
            current_server = Some(result.server_name.as_str());
        }
        print_result_line(result, name_width, use_colors);
    }

    if !report.results.is_empty() {
        println!();
    }

    if report.timed_out {
        let line = format!(
            "Run timed out: {} of {} planned checks produced no result.",
            report.missing_tests(),
            report.expected_tests
        );
        print_warning(&line, use_colors);
        if !report.incomplete_servers.is_empty() {
            println!("  Incomplete: {}", report.incomplete_servers.join(", "));
        }
    }
    for warning in &report.warnings {
        print_warning(warning, use_colors);
    }
    if report.timed_out || !report.warnings.is_empty() {
        println!();
    }

    let passed = !report.has_failures() && !report.timed_out;
    let verdict = if passed { "PASS" } else { "FAIL" };
    let verdict = match (use_colors, passed) {
        (false, _) => verdict.normal(),
        (true, true) => verdict.green().bold(),
        (true, false) => verdict.red().bold(),
    };
    println!(
        "{verdict}: {} passed, {} failed, {} skipped ({} of {} servers tested, {}ms)",
        report.passed_tests,
        report.failed_tests,
        report.skipped_tests,
        report.tested_servers,
        report.total_servers,
        report.total_duration.as_millis()
    );
    if !report.critical_failures.is_empty() {
        println!(
            "{} critical configuration failure(s).",
            report.critical_failures.len()
        );
    }
}

fn print_result_line(result: &TestResult, name_width: usize, use_colors: bool) {
    let tag = match result.status {
        TestStatus::Pass => "OK",
        TestStatus::Fail => "FAIL",
        TestStatus::Skip => "SKIP",
        TestStatus::Timeout => "TIME",
    };
    let tag = format!("{tag:<4}");
    let tag = match result.status {
        _ if !use_colors => tag.normal(),
        TestStatus::Pass => tag.green(),
        TestStatus::Fail => tag.red(),
        TestStatus::Skip => tag.dimmed(),
        TestStatus::Timeout => tag.yellow(),
    };

    let message = match result.status {
        TestStatus::Skip => result.details.as_deref(),
        _ => result.error_message.as_deref(),
    }
    .unwrap_or_default();

    println!(
        "  {tag} {:<13} {:<name_width$} {message}",
        result.test_type.as_str(),
        result.test_name,
    );
    if result.status.is_failure()
        && let Some(fix) = &result.fix_suggestion
    {
        let fix = format!("fix: {fix}");
        if use_colors {
            println!("       {}", fix.cyan());
        } else {
            println!("       {fix}");
        }
    }
}

fn print_warning(line: &str, use_colors: bool) {
    if use_colors {
        println!("{} {line}", "WARN".yellow());
    } else {
        println!("WARN {line}");
    }
}
