use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use fleetmend_core::ApprovalMode;

/// Diagnose a fleet snapshot and remediate what it finds.
///
/// Reads diagnostic records as JSON, runs detection, prediction,
/// recommendation, approval, execution, validation and outcome reporting,
/// and exits with a code describing the run.
#[derive(Parser, Debug)]
#[command(name = "fleetmend", version, about = "Fleet diagnostics to remediation")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/fleetmend/config.toml)
    #[arg(long, global = true, env = "FLEETMEND_CONFIG")]
    pub config: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "FLEETMEND_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the workflow over a snapshot
    Run(RunArgs),
    /// Check a definitions document and report problems
    Lint(LintArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Snapshot file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,

    /// Approval mode: Assisted or Automatic
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<ApprovalMode>,

    /// Show every plan without executing anything
    #[arg(long)]
    pub what_if: bool,

    /// Definitions document (patterns, rules, plans)
    #[arg(long)]
    pub definitions: Option<PathBuf>,

    /// Feature definition document
    #[arg(long)]
    pub features: Option<PathBuf>,

    /// Validation rules document; enables validation
    #[arg(long)]
    pub validation: Option<PathBuf>,

    /// Directory of remediation command programs
    #[arg(long)]
    pub commands_dir: Option<PathBuf>,

    /// Shell command serving model inference
    #[arg(long)]
    pub model_command: Option<String>,

    /// Host name reported in telemetry
    #[arg(long)]
    pub host: Option<String>,

    /// Print the workflow summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LintArgs {
    /// Definitions document to check
    pub definitions: PathBuf,

    /// Print findings as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_mode(s: &str) -> Result<ApprovalMode, String> {
    s.parse().map_err(|e: fleetmend_core::FleetError| e.to_string())
}
