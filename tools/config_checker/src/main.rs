use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use config_checker::{CheckOutput, check_paths};
use config_validator::{Severity, ValidationIssue};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Enforce value ranges and types for configuration parameters",
    long_about = None
)]
struct Cli {
    /// Path to the configuration file (JSON or YAML)
    #[arg(short = 'c', long = "config")]
    config: PathBuf,
    /// Path to the rules file (JSON)
    #[arg(short = 'r', long = "rules")]
    rules: PathBuf,
    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match check_paths(&cli.config, &cli.rules) {
        Ok(output) => Ok(report(&output)),
        Err(err) => {
            error!("{err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_logging(default_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("invalid log level `{default_level}`"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
    Ok(())
}

fn report(output: &CheckOutput) -> ExitCode {
    if output.rule_count == 0 {
        warn!("Rules file contains no rules; nothing to check.");
    }

    for issue in &output.report.issues {
        log_issue(issue);
    }

    if output.report.is_valid() {
        info!(
            warnings = output.report.warning_count(),
            "Configuration is valid."
        );
        ExitCode::SUCCESS
    } else {
        error!(
            errors = output.report.error_count(),
            warnings = output.report.warning_count(),
            "Configuration is invalid."
        );
        ExitCode::FAILURE
    }
}

fn log_issue(issue: &ValidationIssue) {
    let location = issue
        .location
        .map(|loc| format!(" (line {}, column {})", loc.line, loc.column))
        .unwrap_or_default();
    match issue.severity {
        Severity::Error => error!("{}{location}", issue.message),
        Severity::Warning => warn!("{}{location}", issue.message),
    }
}
