mod cli;
mod config;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use fleetmend_core::config::load_dotenv;
use fleetmend_core::{parse_records, ApprovalMode, Config};
use fleetmend_remediation::{
    discover_commands, ApprovalCallback, AutoApprove, CommandRegistry, DryRun, RemediationCommand,
    ShellCommand,
};
use fleetmend_rules::lint::lint_definitions;
use fleetmend_rules::loader::{definitions_from_value, read_document, LoadStatus};
use fleetmend_telemetry::TelemetryFeedback;
use fleetmend_workflow::{WorkflowOrchestrator, WorkflowRequest};

use crate::cli::{CliArgs, Command, LintArgs, RunArgs};
use crate::config::CliConfig;
use crate::terminal::{Terminal, TerminalApprover};

/// Exit code for problems found before a workflow starts.
const USAGE_EXIT_CODE: i32 = 3;

#[tokio::main]
async fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { USAGE_EXIT_CODE } else { 0 };
            e.print().ok();
            std::process::exit(code);
        }
    };

    init_tracing(args.log_file.as_deref());

    let code = match dispatch(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "fleetmend failed before the workflow started");
            eprintln!("error: {e:#}");
            USAGE_EXIT_CODE
        }
    };
    std::process::exit(code);
}

/// Log to `log_file` when it can be opened, otherwise to stderr.
fn init_tracing(log_file: Option<&Path>) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let opened = log_file.map(|path| (path, OpenOptions::new().create(true).append(true).open(path)));
    match opened {
        Some((_, Ok(file))) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        other => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            if let Some((path, Err(e))) = other {
                warn!(path = %path.display(), error = %e, "cannot open log file, logging to stderr");
            }
        }
    }
}

async fn dispatch(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::Run(run_args) => {
            let cli_config = CliConfig::load(args.config.as_deref())
                .context("failed to load configuration")?;
            run(run_args, cli_config).await
        }
        Command::Lint(lint_args) => lint(lint_args),
    }
}

// ── run ───────────────────────────────────────────────────────

async fn run(args: RunArgs, cli_config: CliConfig) -> Result<i32> {
    load_dotenv();
    let mut config = Config::from_env();
    apply_overrides(&mut config, &args, &cli_config);
    config.log_summary();

    let from_stdin = args.input.as_deref().map_or(true, |p| p == Path::new("-"));
    let text = read_input(args.input.as_deref()).context("failed to read diagnostic snapshot")?;
    let records = parse_records(&text).context("failed to parse diagnostic snapshot")?;
    info!(records = records.len(), "snapshot loaded");

    let approver: Arc<dyn ApprovalCallback> = if args.what_if {
        info!("what-if run, no plan will execute");
        Arc::new(DryRun)
    } else {
        match config.execution.approval_mode {
            ApprovalMode::Automatic => Arc::new(AutoApprove),
            ApprovalMode::Assisted => {
                if from_stdin {
                    warn!("snapshot read from stdin, approval prompts will see end of input and skip every plan");
                }
                Arc::new(TerminalApprover)
            }
        }
    };

    let registry = build_registry(&cli_config, &config);
    let telemetry = TelemetryFeedback::from_config(&config.telemetry, cli_config.telemetry_headers.clone());
    let orchestrator = WorkflowOrchestrator::new(registry, approver)
        .with_limits(config.limits.clone())
        .with_host(config.telemetry.server_name.clone())
        .with_telemetry(telemetry);

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling after the current step");
            token.store(true, Ordering::SeqCst);
        }
    });

    let request = WorkflowRequest::from_config(records, &config);
    let summary = orchestrator.run(request).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        Terminal.print_summary(&summary)?;
    }
    Ok(summary.overall_status.exit_code())
}

/// Flags win over the config file, which wins over the environment.
/// `--what-if` always runs Assisted.
fn apply_overrides(config: &mut Config, args: &RunArgs, cli_config: &CliConfig) {
    if let Some(path) = &args.definitions {
        config.definitions.definitions_path = Some(path.clone());
    }
    if let Some(path) = &args.features {
        config.definitions.feature_definition_path = Some(path.clone());
    }
    if let Some(path) = &args.validation {
        config.definitions.validation_rules_path = Some(path.clone());
    }
    if let Some(dir) = &args.commands_dir {
        config.execution.commands_dir = Some(dir.clone());
    }
    if let Some(command) = &args.model_command {
        config.model.command = Some(command.clone());
    }
    if let Some(host) = &args.host {
        config.telemetry.server_name = host.clone();
    }
    config.execution.approval_mode = if args.what_if {
        ApprovalMode::Assisted
    } else {
        cli_config.resolve_mode(args.mode, config.execution.approval_mode)
    };
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read {}", p.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Configured programs first, then anything in the commands directory
/// whose name is not already taken.
fn build_registry(cli_config: &CliConfig, config: &Config) -> Arc<CommandRegistry> {
    let timeout = Duration::from_secs(config.execution.command_timeout_secs);
    let mut registry = CommandRegistry::new();

    for (target, program) in &cli_config.commands {
        if let Err(e) = registry.register(ShellCommand::from_program(target, program, timeout)) {
            warn!(target = %target, error = %e, "skipping configured command");
        }
    }
    if let Some(dir) = &config.execution.commands_dir {
        for command in discover_commands(dir, timeout) {
            if registry.contains(command.name()) {
                debug!(command = command.name(), "configured command shadows discovered program");
                continue;
            }
            if let Err(e) = registry.register(command) {
                warn!(error = %e, "skipping discovered command");
            }
        }
    }

    info!(commands = registry.len(), names = ?registry.names(), "command registry ready");
    Arc::new(registry)
}

// ── lint ──────────────────────────────────────────────────────

fn lint(args: LintArgs) -> Result<i32> {
    let document: serde_json::Value = read_document(&args.definitions)
        .with_context(|| format!("failed to read {}", args.definitions.display()))?;
    let (set, sections) = definitions_from_value(&document, Some(&args.definitions));
    for section in &sections {
        match &section.status {
            LoadStatus::Loaded { count } => debug!(section = section.section, count, "section loaded"),
            LoadStatus::Skipped { reason } => info!(section = section.section, reason = %reason, "section uses built-in defaults"),
            LoadStatus::Failed { error } => warn!(section = section.section, error = %error, "section unreadable"),
        }
    }

    let result = lint_definitions(&set);
    let failed_sections = sections
        .iter()
        .any(|s| matches!(s.status, LoadStatus::Failed { .. }));
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        Terminal.print_lint(&result)?;
    }
    Ok(if result.valid && !failed_sections { 0 } else { 1 })
}
