use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, BufRead, Write};
use tracing::warn;

use fleetmend_core::{ExecutionStatus, OverallStatus, RemediationActionPlan, WorkflowSummary};
use fleetmend_remediation::{ApprovalCallback, ApprovalDecision};
use fleetmend_rules::lint::LintResult;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const PROMPT: Color = Color::Green;
    const PLAN: Color = Color::Cyan;
    const WARN: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

fn status_color(status: OverallStatus) -> Color {
    match status {
        OverallStatus::Completed => Color::Green,
        OverallStatus::CompletedNoRemediation => Colors::DIM,
        OverallStatus::CompletedWithFailures | OverallStatus::CompletedWithValidationFailures => {
            Colors::WARN
        }
        OverallStatus::FailedWithError | OverallStatus::Running => Colors::ERROR,
    }
}

/// Human-readable run and lint reports.
pub struct Terminal;

impl Terminal {
    pub fn print_summary(&self, summary: &WorkflowSummary) -> Result<()> {
        let mut stdout = io::stdout();
        let c = &summary.counters;
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("fleetmend"),
            ResetColor,
            Print(format!(" run {} on {}\n", summary.run_id, summary.host)),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "features {} | patterns {} | predictions {} ({} high confidence) | recommendations {}\n",
                c.features_generated,
                c.patterns_matched,
                c.predictions_made,
                c.high_confidence_predictions,
                c.recommendations_offered
            )),
            ResetColor,
        )?;

        for (plan, result) in summary.plans.iter().zip(&summary.execution_results) {
            let color = if result.status.is_failure() {
                Colors::ERROR
            } else if result.status == ExecutionStatus::Success {
                Colors::PLAN
            } else {
                Colors::DIM
            };
            execute!(
                stdout,
                SetForegroundColor(color),
                Print(format!("  [{}] ", result.status.as_str())),
                ResetColor,
                Print(format!("{} ({})\n", plan.title, plan.action_id)),
            )?;
            for error in &result.errors {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::DIM),
                    Print(format!("      {error}\n")),
                    ResetColor,
                )?;
            }
        }

        for report in summary.validation_reports.iter().filter(|r| r.is_failed()) {
            let target = report.action_id.as_deref().unwrap_or("batch");
            execute!(
                stdout,
                SetForegroundColor(Colors::WARN),
                Print(format!("  validation failed for {target}\n")),
                ResetColor,
            )?;
            for note in &report.notes {
                execute!(stdout, Print(format!("      {note}\n")))?;
            }
        }

        execute!(
            stdout,
            Print(format!(
                "executed {} of {} attempted | validations {} passed, {} failed\n",
                c.actions_executed, c.remediations_attempted, c.validations_passed, c.validations_failed
            )),
            SetForegroundColor(status_color(summary.overall_status)),
            Print(format!("{}\n", summary.overall_status)),
            ResetColor,
        )?;
        if let Some(detail) = &summary.error_detail {
            execute!(
                stdout,
                SetForegroundColor(Colors::ERROR),
                Print(format!("error: {detail}\n")),
                ResetColor,
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn print_lint(&self, result: &LintResult) -> Result<()> {
        let mut stdout = io::stdout();
        for error in &result.errors {
            let suggestion = error.suggestion.as_deref().map(|s| format!(" {s}")).unwrap_or_default();
            execute!(
                stdout,
                SetForegroundColor(Colors::ERROR),
                Print("error"),
                ResetColor,
                Print(format!(" {}: {}{}\n", error.path, error.message, suggestion)),
            )?;
        }
        for warning in &result.warnings {
            execute!(
                stdout,
                SetForegroundColor(Colors::WARN),
                Print("warning"),
                ResetColor,
                Print(format!(" {}: {}\n", warning.path, warning.message)),
            )?;
        }
        execute!(
            stdout,
            Print(format!(
                "{} error(s), {} warning(s)\n",
                result.errors.len(),
                result.warnings.len()
            )),
        )?;
        stdout.flush()?;
        Ok(())
    }
}

// ── Interactive approval ──────────────────────────────────────

/// Asks the operator on the terminal before each plan runs.
///
/// Anything other than `y`/`yes` skips the plan, including end of input.
pub struct TerminalApprover;

fn describe(plan: &RemediationActionPlan) -> String {
    let mut text = format!("\n{} ({})\n", plan.title, plan.action_id);
    if !plan.description.is_empty() {
        text.push_str(&format!("  {}\n", plan.description));
    }
    if let Some(target) = &plan.target_reference {
        text.push_str(&format!("  command: {target}\n"));
    }
    for (name, value) in &plan.resolved_parameters {
        text.push_str(&format!("  {name} = {value}\n"));
    }
    if !plan.impact.is_empty() {
        text.push_str(&format!("  impact: {}\n", plan.impact));
    }
    text
}

fn ask(plan_text: String) -> io::Result<bool> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        SetForegroundColor(Colors::PLAN),
        Print(plan_text),
        SetForegroundColor(Colors::PROMPT),
        Print("run this remediation? [y/N] "),
        ResetColor,
    )?;
    stdout.flush()?;

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl ApprovalCallback for TerminalApprover {
    async fn confirm(&self, plan: &RemediationActionPlan) -> ApprovalDecision {
        let text = describe(plan);
        match tokio::task::spawn_blocking(move || ask(text)).await {
            Ok(Ok(true)) => ApprovalDecision::Approved,
            Ok(Ok(false)) => ApprovalDecision::Skipped,
            Ok(Err(e)) => {
                warn!(action_id = %plan.action_id, error = %e, "could not read approval, skipping");
                ApprovalDecision::Skipped
            }
            Err(e) => {
                warn!(action_id = %plan.action_id, error = %e, "approval prompt failed, skipping");
                ApprovalDecision::Skipped
            }
        }
    }
}
