//! Per-run aggregate returned by the workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{ExecutionResult, RemediationActionPlan, ValidationReport};
use crate::finding::{PatternMatch, PredictionResult, RecommendationSet};

/// Terminal state of a workflow run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OverallStatus {
    Running,
    Completed,
    CompletedWithFailures,
    CompletedWithValidationFailures,
    CompletedNoRemediation,
    FailedWithError,
}

impl OverallStatus {
    /// Process exit code for host automation.
    pub fn exit_code(&self) -> i32 {
        match self {
            OverallStatus::Completed => 0,
            OverallStatus::CompletedWithFailures => 1,
            OverallStatus::CompletedWithValidationFailures => 2,
            OverallStatus::FailedWithError | OverallStatus::Running => 3,
            OverallStatus::CompletedNoRemediation => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Running => "Running",
            OverallStatus::Completed => "Completed",
            OverallStatus::CompletedWithFailures => "CompletedWithFailures",
            OverallStatus::CompletedWithValidationFailures => "CompletedWithValidationFailures",
            OverallStatus::CompletedNoRemediation => "CompletedNoRemediation",
            OverallStatus::FailedWithError => "FailedWithError",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowCounters {
    pub features_generated: usize,
    pub patterns_matched: usize,
    pub predictions_made: usize,
    pub high_confidence_predictions: usize,
    pub recommendations_offered: usize,
    pub remediations_attempted: usize,
    pub actions_executed: usize,
    pub validations_passed: usize,
    pub validations_failed: usize,
    pub pending_retrain_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub run_id: Uuid,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub overall_status: OverallStatus,
    pub counters: WorkflowCounters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub pattern_matches: Vec<PatternMatch>,
    pub predictions: Vec<PredictionResult>,
    pub recommendations: Vec<RecommendationSet>,
    pub plans: Vec<RemediationActionPlan>,
    pub execution_results: Vec<ExecutionResult>,
    pub validation_reports: Vec<ValidationReport>,
}

impl WorkflowSummary {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            host: host.into(),
            started_at: Utc::now(),
            finished_at: None,
            overall_status: OverallStatus::Running,
            counters: WorkflowCounters::default(),
            error_detail: None,
            pattern_matches: Vec::new(),
            predictions: Vec::new(),
            recommendations: Vec::new(),
            plans: Vec::new(),
            execution_results: Vec::new(),
            validation_reports: Vec::new(),
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
