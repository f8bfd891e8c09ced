//! Remediation-side types: action plans, approval, execution and validation.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FleetError;

// ── Approval mode ─────────────────────────────────────────────

/// Whether plan execution needs operator confirmation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ApprovalMode {
    /// Every plan is confirmed by an operator before it runs.
    #[default]
    Assisted,
    /// Plans run unattended.
    Automatic,
}

impl FromStr for ApprovalMode {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assisted" => Ok(ApprovalMode::Assisted),
            "automatic" | "auto" => Ok(ApprovalMode::Automatic),
            other => Err(FleetError::Config(format!(
                "unknown approval mode '{other}' (expected Assisted or Automatic)"
            ))),
        }
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalMode::Assisted => f.write_str("Assisted"),
            ApprovalMode::Automatic => f.write_str("Automatic"),
        }
    }
}

// ── Action plans ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ImplementationType {
    /// No automation exists; an operator has to act.
    #[default]
    Manual,
    /// Backed by a registered remediation command.
    Scripted,
}

/// The resolved, executable form of a recommendation or pattern match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemediationActionPlan {
    pub action_id: String,
    /// Recommendation id or pattern name this plan was resolved from.
    pub source_id: String,
    pub title: String,
    pub description: String,
    pub implementation_type: ImplementationType,
    /// Name of the remediation command to run.
    pub target_reference: Option<String>,
    pub resolved_parameters: IndexMap<String, serde_json::Value>,
    pub confirmation_required: bool,
    pub impact: String,
    pub success_criteria: String,
}

// ── Execution ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    /// The command ran and reported failure.
    Failed,
    /// Invoking the command errored.
    FailedExecution,
    /// No command is registered under the plan's target reference.
    FailedDependencyMissing,
    /// The plan has no automated implementation.
    FailedMapping,
    SkippedByUser,
    SkippedWhatIf,
}

impl ExecutionStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Failed
                | ExecutionStatus::FailedExecution
                | ExecutionStatus::FailedDependencyMissing
                | ExecutionStatus::FailedMapping
        )
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ExecutionStatus::SkippedByUser | ExecutionStatus::SkippedWhatIf)
    }

    /// True when the executor was invoked for the plan.
    pub fn was_attempted(&self) -> bool {
        !self.is_skipped()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "Success",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::FailedExecution => "FailedExecution",
            ExecutionStatus::FailedDependencyMissing => "FailedDependencyMissing",
            ExecutionStatus::FailedMapping => "FailedMapping",
            ExecutionStatus::SkippedByUser => "SkippedByUser",
            ExecutionStatus::SkippedWhatIf => "SkippedWhatIf",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub action_id: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ExecutionResult {
    pub fn new(action_id: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            action_id: action_id.into(),
            status,
            output: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

// ── Validation ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// None for reports not tied to a single plan.
    pub action_id: Option<String>,
    pub overall_status: ValidationStatus,
    pub step_results: Vec<StepResult>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ValidationReport {
    /// Build a report whose status follows from its steps.
    pub fn from_steps(action_id: impl Into<String>, step_results: Vec<StepResult>) -> Self {
        let overall_status = if step_results.iter().all(|s| s.passed) {
            ValidationStatus::Passed
        } else {
            ValidationStatus::Failed
        };
        Self {
            action_id: Some(action_id.into()),
            overall_status,
            step_results,
            notes: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.overall_status == ValidationStatus::Failed
    }
}
