//! Post-execution validation.
//!
//! A [`StepResolver`] derives steps for a plan, a [`ResultTester`] runs them.
//! The engine only runs when both are present and the plan executed
//! successfully; a plan with no derived steps is skipped, not failed.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use fleetmend_core::{
    ExecutionResult, ExecutionStatus, RemediationActionPlan, StepResult, ValidationReport,
};
use fleetmend_rules::loader::{read_document, DefinitionError};

use crate::command::{CommandError, CommandRequest};
use crate::registry::CommandRegistry;
use crate::template;

// ── Rule document ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStep {
    #[serde(alias = "Name")]
    pub name: String,
    /// Command that performs the check.
    #[serde(alias = "Check")]
    pub check: String,
    /// May reference the plan's resolved parameters as `${Name}`.
    #[serde(default, alias = "Parameters")]
    pub parameters: IndexMap<String, Value>,
}

/// Validation steps by action id, with a fallback list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, alias = "Rules")]
    pub rules: IndexMap<String, Vec<ValidationStep>>,
    #[serde(default, alias = "DefaultSteps")]
    pub default_steps: Vec<ValidationStep>,
}

impl ValidationRules {
    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let rules: Self = read_document(path)?;
        info!(
            path = %path.display(),
            actions = rules.rules.len(),
            default_steps = rules.default_steps.len(),
            "loaded validation rules"
        );
        Ok(rules)
    }

    pub fn steps_for(&self, action_id: &str) -> &[ValidationStep] {
        self.rules
            .get(action_id)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_steps)
    }
}

// ── Collaborators ─────────────────────────────────────────────

pub trait StepResolver: Send + Sync {
    fn resolve(&self, plan: &RemediationActionPlan) -> Vec<ValidationStep>;
}

#[async_trait]
pub trait ResultTester: Send + Sync {
    async fn test(
        &self,
        plan: &RemediationActionPlan,
        step: &ValidationStep,
    ) -> Result<StepResult, CommandError>;
}

/// Resolves steps from a [`ValidationRules`] document, substituting the
/// plan's resolved parameters into step parameters.
pub struct RuleStepResolver {
    rules: ValidationRules,
}

impl RuleStepResolver {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }
}

impl StepResolver for RuleStepResolver {
    fn resolve(&self, plan: &RemediationActionPlan) -> Vec<ValidationStep> {
        let lookup = |name: &str| match name {
            "ActionId" => Some(Value::String(plan.action_id.clone())),
            _ => plan.resolved_parameters.get(name).cloned(),
        };
        self.rules
            .steps_for(&plan.action_id)
            .iter()
            .map(|step| {
                let mut unresolved = Vec::new();
                let parameters = step
                    .parameters
                    .iter()
                    .map(|(k, v)| (k.clone(), template::substitute(v, &lookup, &mut unresolved)))
                    .collect();
                if !unresolved.is_empty() {
                    warn!(step = %step.name, placeholders = ?unresolved, "unresolved validation parameters");
                }
                ValidationStep {
                    name: step.name.clone(),
                    check: step.check.clone(),
                    parameters,
                }
            })
            .collect()
    }
}

/// Runs each step's `check` through the command registry. A step passes
/// iff the command reports success.
pub struct CommandTester {
    registry: Arc<CommandRegistry>,
}

impl CommandTester {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ResultTester for CommandTester {
    async fn test(
        &self,
        plan: &RemediationActionPlan,
        step: &ValidationStep,
    ) -> Result<StepResult, CommandError> {
        let command = self
            .registry
            .get(&step.check)
            .ok_or_else(|| CommandError::NotFound(step.check.clone()))?;
        let request = CommandRequest {
            action_id: plan.action_id.clone(),
            resolved_parameters: step.parameters.clone(),
        };
        let outcome = command.run(&request).await?;
        let detail = if outcome.success || outcome.errors.is_empty() {
            outcome.output
        } else {
            outcome.errors.join("; ")
        };
        Ok(StepResult {
            name: step.name.clone(),
            passed: outcome.success,
            detail,
        })
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Default, Clone)]
pub struct ValidationEngine {
    resolver: Option<Arc<dyn StepResolver>>,
    tester: Option<Arc<dyn ResultTester>>,
}

impl ValidationEngine {
    pub fn new(resolver: Option<Arc<dyn StepResolver>>, tester: Option<Arc<dyn ResultTester>>) -> Self {
        Self { resolver, tester }
    }

    pub async fn validate(
        &self,
        plan: &RemediationActionPlan,
        result: &ExecutionResult,
    ) -> Option<ValidationReport> {
        let (Some(resolver), Some(tester)) = (&self.resolver, &self.tester) else {
            debug!(action_id = %plan.action_id, "validation not configured");
            return None;
        };
        if result.status != ExecutionStatus::Success {
            debug!(action_id = %plan.action_id, status = result.status.as_str(), "not validating unsuccessful execution");
            return None;
        }

        let steps = resolver.resolve(plan);
        if steps.is_empty() {
            info!(action_id = %plan.action_id, "no validation steps, skipping");
            return None;
        }

        let mut step_results = Vec::with_capacity(steps.len());
        for step in &steps {
            let step_result = match tester.test(plan, step).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(action_id = %plan.action_id, step = %step.name, error = %e, "validation step errored");
                    StepResult {
                        name: step.name.clone(),
                        passed: false,
                        detail: e.to_string(),
                    }
                }
            };
            step_results.push(step_result);
        }

        let report = ValidationReport::from_steps(&plan.action_id, step_results);
        info!(
            action_id = %plan.action_id,
            steps = report.step_results.len(),
            failed = report.is_failed(),
            "validation finished"
        );
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutcome, RemediationCommand};
    use fleetmend_core::ImplementationType;
    use serde_json::json;

    fn plan(action_id: &str, params: Value) -> RemediationActionPlan {
        RemediationActionPlan {
            action_id: action_id.into(),
            source_id: "REC".into(),
            title: String::new(),
            description: String::new(),
            implementation_type: ImplementationType::Scripted,
            target_reference: None,
            resolved_parameters: serde_json::from_value(params).unwrap(),
            confirmation_required: false,
            impact: String::new(),
            success_criteria: String::new(),
        }
    }

    fn rules() -> ValidationRules {
        serde_json::from_value(json!({
            "rules": {
                "REM_SVC_RESTART": [
                    {"name": "running", "check": "service-status", "parameters": {"ServiceName": "${ServiceName}"}},
                    {"name": "logs", "check": "missing-check"}
                ]
            },
            "defaultSteps": []
        }))
        .unwrap()
    }

    struct ServiceStatus;

    #[async_trait]
    impl RemediationCommand for ServiceStatus {
        fn name(&self) -> &str {
            "service-status"
        }

        async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome, CommandError> {
            match request.resolved_parameters.get("ServiceName") {
                Some(Value::String(s)) if s == "Spooler" => Ok(CommandOutcome::success("Running")),
                _ => Ok(CommandOutcome::failure("Stopped")),
            }
        }
    }

    fn engine() -> ValidationEngine {
        let mut registry = CommandRegistry::new();
        registry.register(ServiceStatus).unwrap();
        ValidationEngine::new(
            Some(Arc::new(RuleStepResolver::new(rules()))),
            Some(Arc::new(CommandTester::new(Arc::new(registry)))),
        )
    }

    #[test]
    fn resolver_substitutes_plan_parameters() {
        let resolver = RuleStepResolver::new(rules());
        let steps = resolver.resolve(&plan("REM_SVC_RESTART", json!({"ServiceName": "Spooler"})));
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].parameters["ServiceName"], json!("Spooler"));
        assert!(resolver.resolve(&plan("REM_OTHER", json!({}))).is_empty());
    }

    #[tokio::test]
    async fn tester_errors_are_failed_steps() {
        let p = plan("REM_SVC_RESTART", json!({"ServiceName": "Spooler"}));
        let ok = ExecutionResult::new("REM_SVC_RESTART", ExecutionStatus::Success);
        let report = engine().validate(&p, &ok).await.unwrap();
        assert!(report.step_results[0].passed);
        assert!(!report.step_results[1].passed);
        assert!(report.step_results[1].detail.contains("missing-check"));
        assert!(report.is_failed());
    }

    #[tokio::test]
    async fn skipped_without_success_steps_or_collaborators() {
        let p = plan("REM_SVC_RESTART", json!({"ServiceName": "Spooler"}));
        let failed = ExecutionResult::new("REM_SVC_RESTART", ExecutionStatus::Failed);
        assert!(engine().validate(&p, &failed).await.is_none());

        let ok = ExecutionResult::new("REM_OTHER", ExecutionStatus::Success);
        assert!(engine().validate(&plan("REM_OTHER", json!({})), &ok).await.is_none());

        let unconfigured = ValidationEngine::default();
        assert!(unconfigured.validate(&p, &ok).await.is_none());
    }

    #[test]
    fn loads_yaml_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validation.yaml");
        std::fs::write(
            &path,
            "rules:\n  REM_NET_FLUSH_DNS:\n    - name: resolve\n      check: dns-resolve\ndefaultSteps:\n  - name: ping\n    check: ping-host\n",
        )
        .unwrap();
        let rules = ValidationRules::load(&path).unwrap();
        assert_eq!(rules.steps_for("REM_NET_FLUSH_DNS")[0].check, "dns-resolve");
        assert_eq!(rules.steps_for("REM_ANY")[0].name, "ping");
    }
}
