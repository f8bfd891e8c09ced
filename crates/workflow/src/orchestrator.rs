//! Workflow state machine.
//!
//! Stages run strictly in order over the whole batch. Only feature
//! extraction and cancellation abort a run; every other stage degrades to
//! empty results. The orchestrator is the only writer of the summary and
//! the only place `OverallStatus` is decided.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, info_span, warn, Instrument};

use fleetmend_core::config::LimitsConfig;
use fleetmend_core::{
    DiagnosticRecord, ExecutionResult, ExecutionStatus, FeatureSet, OverallStatus, PatternMatch,
    PredictionResult, RemediationActionPlan, TelemetryPayload, ValidationReport, ValidationStatus,
    WorkflowSummary,
};
use fleetmend_predict::PredictionConsumer;
use fleetmend_remediation::{
    ApprovalCallback, ApprovalGate, CommandRegistry, CommandTester, RemediationExecutor,
    RemediationPlanner, ResultTester, RuleStepResolver, StepResolver, ValidationEngine,
};
use fleetmend_rules::{FeatureExtractor, PatternMatcher, RecommendationEngine};
use fleetmend_telemetry::TelemetryFeedback;

use crate::error::WorkflowError;
use crate::request::WorkflowRequest;
use crate::stage::WorkflowStage;

/// Note attached to the report injected when validation was required but
/// nothing was validated.
pub const MISSING_VALIDATION_NOTE: &str =
    "validation rules were configured but no plan produced a validation report";

pub struct WorkflowOrchestrator {
    limits: LimitsConfig,
    host: String,
    gate: ApprovalGate,
    executor: RemediationExecutor,
    tester: Option<Arc<dyn ResultTester>>,
    telemetry: TelemetryFeedback,
    cancelled: Arc<AtomicBool>,
}

impl WorkflowOrchestrator {
    /// Commands in `registry` serve both remediation and validation checks.
    pub fn new(registry: Arc<CommandRegistry>, approval: Arc<dyn ApprovalCallback>) -> Self {
        Self {
            limits: LimitsConfig::default(),
            host: "localhost".to_string(),
            gate: ApprovalGate::new(approval),
            tester: Some(Arc::new(CommandTester::new(Arc::clone(&registry)))),
            executor: RemediationExecutor::new(registry),
            telemetry: TelemetryFeedback::disabled(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replace the validation result tester. None disables validation.
    pub fn with_tester(mut self, tester: Option<Arc<dyn ResultTester>>) -> Self {
        self.tester = tester;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryFeedback) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Flag checked between stages and between plans.
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        info!("workflow cancellation requested");
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Run the whole pipeline. Always returns a complete summary.
    pub async fn run(&self, request: WorkflowRequest) -> WorkflowSummary {
        let mut summary = WorkflowSummary::new(&self.host);
        let span = info_span!("workflow", run_id = %summary.run_id, host = %summary.host);

        async {
            info!(
                records = request.input_records.len(),
                mode = %request.approval_mode,
                "workflow started"
            );

            match self.run_stages(&request, &mut summary).await {
                Ok(()) => summary.overall_status = derive_status(&summary),
                Err(e) => {
                    error!(error = %e, "workflow failed");
                    summary.error_detail = Some(e.to_string());
                    summary.overall_status = OverallStatus::FailedWithError;
                }
            }
            summary.finished_at = Some(Utc::now());

            info!(
                status = %summary.overall_status,
                duration_ms = summary.duration_ms().unwrap_or_default(),
                attempted = summary.counters.remediations_attempted,
                offered = summary.counters.recommendations_offered,
                "workflow finished"
            );
        }
        .instrument(span)
        .await;

        summary
    }

    fn checkpoint(&self, next: WorkflowStage) -> Result<(), WorkflowError> {
        if self.cancelled.load(Ordering::Relaxed) {
            warn!(stage = %next, "workflow cancelled");
            return Err(WorkflowError::Cancelled(next));
        }
        debug!(stage = %next, "entering stage");
        Ok(())
    }

    async fn run_stages(
        &self,
        request: &WorkflowRequest,
        summary: &mut WorkflowSummary,
    ) -> Result<(), WorkflowError> {
        let records = &request.input_records;

        // ── Features (fatal) ──────────────────────────────────
        self.checkpoint(WorkflowStage::FeatureExtraction)?;
        let feature_sets = FeatureExtractor::extract(records, request.feature_definition.as_ref())?;
        summary.counters.features_generated = feature_sets.len();

        // ── Patterns ──────────────────────────────────────────
        self.checkpoint(WorkflowStage::PatternDetection)?;
        summary.pattern_matches =
            PatternMatcher::match_patterns(records, &request.definitions.patterns, self.limits.max_patterns);
        summary.counters.patterns_matched = summary.pattern_matches.len();

        // ── Prediction ────────────────────────────────────────
        self.checkpoint(WorkflowStage::Prediction)?;
        if let Some(model) = &request.model {
            summary.predictions = PredictionConsumer::predict(
                &feature_sets,
                Some(model.as_ref()),
                &request.model_type,
                &request.prediction_options,
            )
            .await;
            summary.counters.predictions_made =
                summary.predictions.iter().filter(|p| p.is_success()).count();
            summary.counters.high_confidence_predictions = summary
                .predictions
                .iter()
                .filter(|p| {
                    p.is_success()
                        && p.confidence
                            .is_some_and(|c| c >= self.limits.high_confidence_threshold)
                })
                .count();
        } else {
            debug!("no model, skipping prediction");
        }

        // ── Recommendations ───────────────────────────────────
        self.checkpoint(WorkflowStage::Recommendation)?;
        let items = recommendation_items(&summary.pattern_matches, &feature_sets, &summary.predictions);
        summary.recommendations = RecommendationEngine::recommend(
            &items,
            &request.definitions.rules,
            self.limits.max_recommendations_per_input,
        );
        summary.counters.recommendations_offered = summary
            .recommendations
            .iter()
            .map(|set| set.recommendations.len())
            .sum();

        // ── Plans ─────────────────────────────────────────────
        self.checkpoint(WorkflowStage::PlanResolution)?;
        let planner = RemediationPlanner::from_definitions(&request.definitions);
        summary.plans = if summary.recommendations.is_empty() {
            if !summary.pattern_matches.is_empty() {
                info!(
                    patterns = summary.pattern_matches.len(),
                    "no recommendations, resolving plans from pattern matches"
                );
            }
            summary
                .pattern_matches
                .iter()
                .map(|m| planner.resolve_pattern(m))
                .collect()
        } else {
            summary
                .recommendations
                .iter()
                .flat_map(|set| {
                    set.recommendations
                        .iter()
                        .map(|rec| planner.resolve_recommendation(rec, &set.item))
                })
                .collect()
        };

        // ── Approval and execution ────────────────────────────
        self.checkpoint(WorkflowStage::ApprovalAndExecution)?;
        for plan in &summary.plans {
            self.checkpoint(WorkflowStage::ApprovalAndExecution)?;
            let decision = self.gate.approve(plan, request.approval_mode).await;
            let result = match decision.skip_status() {
                Some(status) => ExecutionResult::new(&plan.action_id, status),
                None => self.executor.execute(plan).await,
            };
            if result.status.was_attempted() {
                summary.counters.remediations_attempted += 1;
            }
            if result.status == ExecutionStatus::Success {
                summary.counters.actions_executed += 1;
            }
            summary.execution_results.push(result);
        }

        // ── Validation ────────────────────────────────────────
        self.checkpoint(WorkflowStage::Validation)?;
        let resolver = request
            .validation_rules
            .clone()
            .map(|rules| Arc::new(RuleStepResolver::new(rules)) as Arc<dyn StepResolver>);
        let validation_required = resolver.is_some();
        let engine = ValidationEngine::new(resolver, self.tester.clone());
        // Indexed like `plans`; action ids repeat when rules share a plan.
        let mut plan_reports: Vec<Option<ValidationReport>> = Vec::with_capacity(summary.plans.len());
        for (plan, result) in summary.plans.iter().zip(&summary.execution_results) {
            let report = engine.validate(plan, result).await;
            if let Some(report) = &report {
                summary.validation_reports.push(report.clone());
            }
            plan_reports.push(report);
        }
        if validation_required && !summary.plans.is_empty() && summary.validation_reports.is_empty() {
            warn!(plans = summary.plans.len(), "{MISSING_VALIDATION_NOTE}");
            summary.validation_reports.push(ValidationReport {
                action_id: None,
                overall_status: ValidationStatus::Failed,
                step_results: Vec::new(),
                notes: vec![MISSING_VALIDATION_NOTE.to_string()],
            });
        }
        summary.counters.validations_failed =
            summary.validation_reports.iter().filter(|r| r.is_failed()).count();
        summary.counters.validations_passed =
            summary.validation_reports.len() - summary.counters.validations_failed;

        // ── Telemetry ─────────────────────────────────────────
        self.checkpoint(WorkflowStage::TelemetryReport)?;
        if self.telemetry.is_enabled() {
            let outcomes = summary.plans.iter().zip(&summary.execution_results).zip(&plan_reports);
            for ((plan, result), report) in outcomes {
                if !result.status.was_attempted() {
                    continue;
                }
                let payload = outcome_payload(&self.host, plan, result, report.as_ref());
                if let Some(response) = self.telemetry.report(&payload).await {
                    summary.counters.pending_retrain_requests += response.pending_retrain_requests.len();
                }
            }
            if summary.counters.pending_retrain_requests > 0 {
                info!(
                    pending = summary.counters.pending_retrain_requests,
                    "telemetry endpoint requested model retraining"
                );
            }
        }

        Ok(())
    }
}

/// One item per pattern match, then one per feature set.
///
/// Pattern items start from the first example record so plan parameters can
/// reference its properties. Feature items carry the prediction when it
/// succeeded.
fn recommendation_items(
    matches: &[PatternMatch],
    feature_sets: &[FeatureSet],
    predictions: &[PredictionResult],
) -> Vec<DiagnosticRecord> {
    let mut items = Vec::with_capacity(matches.len() + feature_sets.len());
    for m in matches {
        let mut item = m.example_items.first().cloned().unwrap_or_default();
        item.insert("PatternName", m.pattern_name.as_str());
        item.insert("Description", m.description.as_str());
        item.insert("MatchedItemCount", m.matched_item_count as i64);
        items.push(item);
    }
    for (idx, features) in feature_sets.iter().enumerate() {
        let mut item = features.clone();
        if let Some(p) = predictions.get(idx).filter(|p| p.is_success()) {
            if let Some(label) = &p.predicted_label {
                item.insert("PredictedLabel", label.as_str());
            }
            if let Some(confidence) = p.confidence {
                item.insert("Confidence", confidence);
            }
            if let Some(risk) = p.risk_level {
                item.insert("RiskLevel", risk.as_str());
            }
        }
        items.push(item);
    }
    items
}

fn outcome_payload(
    host: &str,
    plan: &RemediationActionPlan,
    result: &ExecutionResult,
    report: Option<&ValidationReport>,
) -> TelemetryPayload {
    let outcome = match (result.status, report) {
        (ExecutionStatus::Success, Some(r)) if r.is_failed() => "ValidationFailed".to_string(),
        (ExecutionStatus::Success, _) => "success".to_string(),
        (status, _) => status.as_str().to_string(),
    };
    TelemetryPayload {
        server_name: host.to_string(),
        timestamp: Utc::now(),
        error_type: plan.source_id.clone(),
        action: plan.action_id.clone(),
        outcome,
        context: json!({
            "title": plan.title,
            "targetReference": plan.target_reference,
            "resolvedParameters": plan.resolved_parameters,
            "errors": result.errors,
            "validated": report.map(|r| !r.is_failed()),
        }),
    }
}

/// Terminal status precedence for a run that did not abort.
fn derive_status(summary: &WorkflowSummary) -> OverallStatus {
    let any_failed = summary.execution_results.iter().any(|r| r.status.is_failure());
    if any_failed || summary.counters.remediations_attempted < summary.counters.recommendations_offered {
        return OverallStatus::CompletedWithFailures;
    }
    if summary.validation_reports.iter().any(|r| r.is_failed()) {
        return OverallStatus::CompletedWithValidationFailures;
    }
    if summary.counters.remediations_attempted == 0 {
        return OverallStatus::CompletedNoRemediation;
    }
    OverallStatus::Completed
}
