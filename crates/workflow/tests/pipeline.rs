//! End-to-end runs of the orchestrator with in-process collaborators.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use fleetmend_core::{
    parse_records, ApprovalMode, ExecutionStatus, OverallStatus, TelemetryPayload,
};
use fleetmend_predict::{ModelError, ModelInput, ModelOutput, PredictiveModel};
use fleetmend_remediation::{
    AutoApprove, CommandError, CommandOutcome, CommandRegistry, CommandRequest, DryRun,
    RemediationCommand, ValidationRules,
};
use fleetmend_rules::{defaults, DefinitionSet, RecommendationRule};
use fleetmend_telemetry::{TelemetryError, TelemetryFeedback, TelemetrySink};
use fleetmend_workflow::{WorkflowOrchestrator, WorkflowRequest};

// ── Fakes ─────────────────────────────────────────────────────

/// Records every request and answers with a fixed outcome.
struct Recording {
    name: &'static str,
    success: bool,
    seen: Arc<Mutex<Vec<CommandRequest>>>,
}

impl Recording {
    fn new(name: &'static str, success: bool) -> (Self, Arc<Mutex<Vec<CommandRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (Self { name, success, seen: seen.clone() }, seen)
    }
}

#[async_trait]
impl RemediationCommand for Recording {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome, CommandError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(if self.success {
            CommandOutcome::success(format!("{} ok", self.name))
        } else {
            CommandOutcome::failure(format!("{} failed", self.name))
        })
    }
}

/// Check command that only finds `running` up.
struct ServiceStatus {
    running: &'static str,
}

#[async_trait]
impl RemediationCommand for ServiceStatus {
    fn name(&self) -> &str {
        "service-status"
    }

    async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome, CommandError> {
        let service = request.resolved_parameters.get("ServiceName").cloned().unwrap_or(Value::Null);
        Ok(if service == json!(self.running) {
            CommandOutcome::success(format!("{} running", self.running))
        } else {
            CommandOutcome::failure(format!("{service} not running"))
        })
    }
}

struct FailurePredictor;

#[async_trait]
impl PredictiveModel for FailurePredictor {
    fn name(&self) -> &str {
        "failure-predictor"
    }

    async fn infer(&self, _input: &ModelInput) -> Result<ModelOutput, ModelError> {
        Ok(ModelOutput::Probabilities(vec![0.1, 0.9]))
    }
}

struct CollectingSink(Arc<Mutex<Vec<TelemetryPayload>>>);

#[async_trait]
impl TelemetrySink for CollectingSink {
    async fn send(&self, payload: &TelemetryPayload) -> Result<String, TelemetryError> {
        self.0.lock().unwrap().push(payload.clone());
        Ok(r#"{"pendingRetrainRequests": [{"model": "failure-predictor"}]}"#.to_string())
    }

    fn channel_name(&self) -> &str {
        "collecting"
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn service_records() -> Vec<fleetmend_core::DiagnosticRecord> {
    parse_records(
        r#"[{"Message": "The Print Spooler service terminated unexpectedly.", "ServiceName": "Spooler"},
            {"Message": "heartbeat ok"}]"#,
    )
    .unwrap()
}

/// Default patterns and plans, one rule: service termination → restart.
fn restart_only_definitions() -> DefinitionSet {
    let rules = serde_json::from_value(json!([{
        "name": "restart-terminated-service",
        "ifCondition": {"PatternName": "ServiceTerminatedUnexpectedly"},
        "thenRecommend": [{"id": "REC_SVC_RESTART", "title": "Restart the service", "severity": "High"}]
    }]))
    .unwrap();
    DefinitionSet {
        patterns: defaults::patterns(),
        rules,
        plans: defaults::plans(),
    }
}

fn restart_validation() -> ValidationRules {
    serde_json::from_value(json!({
        "rules": {
            "REM_SVC_RESTART": [
                {"name": "running", "check": "service-status", "parameters": {"ServiceName": "${ServiceName}"}}
            ]
        }
    }))
    .unwrap()
}

// ── Tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn remediates_validates_and_reports() {
    let (restart, restart_calls) = Recording::new("restart-service", true);
    let (status_check, check_calls) = Recording::new("service-status", true);
    let mut registry = CommandRegistry::new();
    registry.register(restart).unwrap();
    registry.register(status_check).unwrap();

    let sent = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = WorkflowOrchestrator::new(Arc::new(registry), Arc::new(AutoApprove))
        .with_host("print-01")
        .with_telemetry(TelemetryFeedback::new(Box::new(CollectingSink(sent.clone()))));

    let request = WorkflowRequest::new(service_records())
        .with_definitions(restart_only_definitions())
        .with_validation_rules(restart_validation())
        .with_approval_mode(ApprovalMode::Automatic);
    let summary = orchestrator.run(request).await;

    assert_eq!(summary.overall_status, OverallStatus::Completed, "{:?}", summary.error_detail);
    assert_eq!(summary.counters.features_generated, 2);
    assert_eq!(summary.counters.patterns_matched, 1);
    assert_eq!(summary.counters.recommendations_offered, 1);
    assert_eq!(summary.counters.remediations_attempted, 1);
    assert_eq!(summary.counters.actions_executed, 1);
    assert_eq!(summary.counters.validations_passed, 1);
    assert_eq!(summary.counters.pending_retrain_requests, 1);
    assert!(summary.finished_at.is_some());

    let restart_requests = restart_calls.lock().unwrap();
    assert_eq!(restart_requests[0].action_id, "REM_SVC_RESTART");
    assert_eq!(restart_requests[0].resolved_parameters["ServiceName"], json!("Spooler"));
    assert_eq!(check_calls.lock().unwrap()[0].resolved_parameters["ServiceName"], json!("Spooler"));

    let payloads = sent.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].server_name, "print-01");
    assert_eq!(payloads[0].error_type, "REC_SVC_RESTART");
    assert_eq!(payloads[0].outcome, "success");
}

#[tokio::test]
async fn telemetry_reports_each_plans_own_validation() {
    // Both rules recommend the same restart. Only the pattern item names a
    // service, so the plans built from predictions fail validation.
    let (restart, _) = Recording::new("restart-service", true);
    let mut registry = CommandRegistry::new();
    registry.register(restart).unwrap();
    registry.register(ServiceStatus { running: "Spooler" }).unwrap();

    let mut definitions = restart_only_definitions();
    definitions.rules.extend(
        serde_json::from_value::<Vec<RecommendationRule>>(json!([{
            "name": "restart-on-predicted-failure",
            "ifCondition": {"PredictedLabel": "Class_1"},
            "thenRecommend": [{"id": "REC_SVC_RESTART", "title": "Restart the service"}]
        }]))
        .unwrap(),
    );

    let sent = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = WorkflowOrchestrator::new(Arc::new(registry), Arc::new(AutoApprove))
        .with_telemetry(TelemetryFeedback::new(Box::new(CollectingSink(sent.clone()))));
    let request = WorkflowRequest::new(service_records())
        .with_definitions(definitions)
        .with_model(Arc::new(FailurePredictor))
        .with_validation_rules(restart_validation())
        .with_approval_mode(ApprovalMode::Automatic);
    let summary = orchestrator.run(request).await;

    assert_eq!(summary.plans.len(), 3);
    assert!(summary.plans.iter().all(|p| p.action_id == "REM_SVC_RESTART"));
    let failed: Vec<_> = summary.validation_reports.iter().map(|r| r.is_failed()).collect();
    assert_eq!(failed, vec![false, true, true]);
    assert_eq!(summary.overall_status, OverallStatus::CompletedWithValidationFailures);

    let outcomes: Vec<_> = sent.lock().unwrap().iter().map(|p| p.outcome.clone()).collect();
    assert_eq!(outcomes, vec!["success", "ValidationFailed", "ValidationFailed"]);
}

#[tokio::test]
async fn validation_required_but_nothing_validated() {
    // Rules recommend nothing, so plans come from pattern matches; the dry
    // run keeps every plan from executing.
    let definitions = DefinitionSet {
        rules: Vec::new(),
        ..restart_only_definitions()
    };
    let orchestrator = WorkflowOrchestrator::new(Arc::new(CommandRegistry::new()), Arc::new(DryRun));
    let request = WorkflowRequest::new(service_records())
        .with_definitions(definitions)
        .with_validation_rules(restart_validation())
        .with_approval_mode(ApprovalMode::Assisted);
    let summary = orchestrator.run(request).await;

    assert_eq!(summary.plans.len(), 1);
    assert_eq!(summary.plans[0].source_id, "ServiceTerminatedUnexpectedly");
    assert_eq!(summary.execution_results[0].status, ExecutionStatus::SkippedWhatIf);
    assert_eq!(summary.validation_reports.len(), 1);
    assert!(summary.validation_reports[0].is_failed());
    assert!(summary.validation_reports[0].action_id.is_none());
    assert_eq!(summary.overall_status, OverallStatus::CompletedWithValidationFailures);
    assert_eq!(summary.overall_status.exit_code(), 2);
}

#[tokio::test]
async fn dry_run_leaves_recommendations_unattempted() {
    let (restart, calls) = Recording::new("restart-service", true);
    let mut registry = CommandRegistry::new();
    registry.register(restart).unwrap();
    let orchestrator = WorkflowOrchestrator::new(Arc::new(registry), Arc::new(DryRun));

    let request = WorkflowRequest::new(service_records())
        .with_definitions(restart_only_definitions())
        .with_approval_mode(ApprovalMode::Assisted);
    let summary = orchestrator.run(request).await;

    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(summary.counters.remediations_attempted, 0);
    assert_eq!(summary.overall_status, OverallStatus::CompletedWithFailures);
}

#[tokio::test]
async fn missing_command_and_manual_plans_fail() {
    // Built-in rules recommend a restart (no command registered) and a
    // recovery review (manual).
    let orchestrator = WorkflowOrchestrator::new(Arc::new(CommandRegistry::new()), Arc::new(AutoApprove));
    let request = WorkflowRequest::new(service_records()).with_approval_mode(ApprovalMode::Automatic);
    let summary = orchestrator.run(request).await;

    let statuses: Vec<_> = summary.execution_results.iter().map(|r| r.status).collect();
    assert!(statuses.contains(&ExecutionStatus::FailedDependencyMissing));
    assert!(statuses.contains(&ExecutionStatus::FailedMapping));
    assert_eq!(summary.overall_status, OverallStatus::CompletedWithFailures);
}

#[tokio::test]
async fn clean_snapshot_needs_no_remediation() {
    let records = parse_records(r#"[{"Message": "all good", "CpuUsage": 12.5}]"#).unwrap();
    let orchestrator = WorkflowOrchestrator::new(Arc::new(CommandRegistry::new()), Arc::new(AutoApprove));
    let summary = orchestrator
        .run(WorkflowRequest::new(records).with_validation_rules(restart_validation()))
        .await;

    assert!(summary.plans.is_empty());
    assert!(summary.validation_reports.is_empty());
    assert_eq!(summary.overall_status, OverallStatus::CompletedNoRemediation);
}

#[tokio::test]
async fn empty_batch_is_fatal() {
    let orchestrator = WorkflowOrchestrator::new(Arc::new(CommandRegistry::new()), Arc::new(AutoApprove));
    let summary = orchestrator.run(WorkflowRequest::new(Vec::new())).await;

    assert_eq!(summary.overall_status, OverallStatus::FailedWithError);
    assert!(summary.error_detail.is_some());
    assert!(summary.finished_at.is_some());
}

#[tokio::test]
async fn cancelled_run_fails_with_error() {
    let orchestrator = WorkflowOrchestrator::new(Arc::new(CommandRegistry::new()), Arc::new(AutoApprove));
    orchestrator.cancellation_token().store(true, Ordering::Relaxed);
    let summary = orchestrator.run(WorkflowRequest::new(service_records())).await;

    assert_eq!(summary.overall_status, OverallStatus::FailedWithError);
    assert!(summary.error_detail.unwrap().contains("FeatureExtraction"));
}

#[tokio::test]
async fn high_confidence_predictions_are_counted() {
    let orchestrator = WorkflowOrchestrator::new(Arc::new(CommandRegistry::new()), Arc::new(DryRun));
    let request = WorkflowRequest::new(service_records())
        .with_definitions(restart_only_definitions())
        .with_model(Arc::new(FailurePredictor));
    let summary = orchestrator.run(request).await;

    assert_eq!(summary.predictions.len(), 2);
    assert_eq!(summary.counters.predictions_made, 2);
    assert_eq!(summary.counters.high_confidence_predictions, 2);
    assert_eq!(
        summary.predictions[0].predicted_label.as_deref(),
        Some("Class_1")
    );
    let item_value: Value = serde_json::to_value(&summary).unwrap();
    assert_eq!(item_value["counters"]["predictionsMade"], 2);
}
