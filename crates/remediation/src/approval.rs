use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use fleetmend_core::{ApprovalMode, ExecutionStatus, RemediationActionPlan};

/// Operator answer for one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecision {
    Approved,
    /// The operator declined.
    Skipped,
    /// A dry run is in effect; nothing may execute.
    SkippedDryRun,
}

impl ApprovalDecision {
    /// Execution status recorded for a plan that does not run.
    pub fn skip_status(&self) -> Option<ExecutionStatus> {
        match self {
            ApprovalDecision::Approved => None,
            ApprovalDecision::Skipped => Some(ExecutionStatus::SkippedByUser),
            ApprovalDecision::SkippedDryRun => Some(ExecutionStatus::SkippedWhatIf),
        }
    }
}

/// Asks for confirmation of a plan in Assisted mode.
/// The CLI implements this with a terminal prompt; embedders supply a policy.
#[async_trait]
pub trait ApprovalCallback: Send + Sync {
    async fn confirm(&self, plan: &RemediationActionPlan) -> ApprovalDecision;
}

/// Approves everything.
pub struct AutoApprove;

#[async_trait]
impl ApprovalCallback for AutoApprove {
    async fn confirm(&self, _plan: &RemediationActionPlan) -> ApprovalDecision {
        ApprovalDecision::Approved
    }
}

/// Skips everything as a what-if run.
pub struct DryRun;

#[async_trait]
impl ApprovalCallback for DryRun {
    async fn confirm(&self, _plan: &RemediationActionPlan) -> ApprovalDecision {
        ApprovalDecision::SkippedDryRun
    }
}

/// Non-interactive answers keyed by action id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// Exact action ids, or prefixes ending in `*` (e.g. `REM_NET_*`).
    pub rules: HashMap<String, ApprovalDecision>,
    /// Answer for plans no rule covers.
    pub default: ApprovalDecision,
}

impl ApprovalPolicy {
    pub fn new(default: ApprovalDecision) -> Self {
        Self {
            rules: HashMap::new(),
            default,
        }
    }

    pub fn with_rule(mut self, pattern: impl Into<String>, decision: ApprovalDecision) -> Self {
        self.rules.insert(pattern.into(), decision);
        self
    }

    /// Exact match first, then the longest matching prefix, then the default.
    pub fn decision_for(&self, action_id: &str) -> ApprovalDecision {
        if let Some(&decision) = self.rules.get(action_id) {
            return decision;
        }
        self.rules
            .iter()
            .filter_map(|(pattern, &decision)| {
                let prefix = pattern.strip_suffix('*')?;
                action_id.starts_with(prefix).then_some((prefix.len(), decision))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, decision)| decision)
            .unwrap_or(self.default)
    }
}

#[async_trait]
impl ApprovalCallback for ApprovalPolicy {
    async fn confirm(&self, plan: &RemediationActionPlan) -> ApprovalDecision {
        self.decision_for(&plan.action_id)
    }
}

/// Decides per plan and mode whether execution proceeds.
pub struct ApprovalGate {
    callback: Arc<dyn ApprovalCallback>,
}

impl ApprovalGate {
    pub fn new(callback: Arc<dyn ApprovalCallback>) -> Self {
        Self { callback }
    }

    /// Automatic approves without asking. Assisted asks the callback for every plan.
    pub async fn approve(&self, plan: &RemediationActionPlan, mode: ApprovalMode) -> ApprovalDecision {
        let decision = match mode {
            ApprovalMode::Automatic => ApprovalDecision::Approved,
            ApprovalMode::Assisted => self.callback.confirm(plan).await,
        };
        info!(action_id = %plan.action_id, mode = %mode, decision = ?decision, "approval");
        decision
    }
}
