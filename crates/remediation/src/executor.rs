use std::sync::Arc;

use tracing::{info, warn};

use fleetmend_core::{ExecutionResult, ExecutionStatus, ImplementationType, RemediationActionPlan};

use crate::command::CommandRequest;
use crate::registry::CommandRegistry;

/// Runs approved plans through the command registry. Never returns an error:
/// every failure mode is an [`ExecutionStatus`].
pub struct RemediationExecutor {
    registry: Arc<CommandRegistry>,
}

impl RemediationExecutor {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, plan: &RemediationActionPlan) -> ExecutionResult {
        if plan.implementation_type == ImplementationType::Manual {
            warn!(action_id = %plan.action_id, "plan has no automated implementation");
            return ExecutionResult::new(&plan.action_id, ExecutionStatus::FailedMapping)
                .with_error(format!("'{}' requires manual remediation", plan.action_id));
        }

        let key = plan.target_reference.as_deref().unwrap_or(&plan.action_id);
        let Some(command) = self
            .registry
            .get(key)
            .or_else(|| self.registry.get(&plan.action_id))
        else {
            warn!(action_id = %plan.action_id, target = key, "remediation command not available");
            return ExecutionResult::new(&plan.action_id, ExecutionStatus::FailedDependencyMissing)
                .with_error(format!("remediation command '{key}' is not available"));
        };

        let request = CommandRequest {
            action_id: plan.action_id.clone(),
            resolved_parameters: plan.resolved_parameters.clone(),
        };
        let result = match command.run(&request).await {
            Ok(outcome) => {
                let status = if outcome.success {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::Failed
                };
                ExecutionResult {
                    action_id: plan.action_id.clone(),
                    status,
                    output: outcome.output,
                    errors: outcome.errors,
                }
            }
            Err(e) => ExecutionResult::new(&plan.action_id, ExecutionStatus::FailedExecution)
                .with_error(e.to_string()),
        };

        info!(
            action_id = %plan.action_id,
            command = command.name(),
            status = result.status.as_str(),
            "remediation executed"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandError, CommandOutcome, RemediationCommand};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fake {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        answer: fn() -> Result<CommandOutcome, CommandError>,
    }

    #[async_trait]
    impl RemediationCommand for Fake {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _request: &CommandRequest) -> Result<CommandOutcome, CommandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.answer)()
        }
    }

    fn plan(target: Option<&str>, kind: ImplementationType) -> RemediationActionPlan {
        RemediationActionPlan {
            action_id: "REM_TEST".into(),
            source_id: "REC_TEST".into(),
            title: String::new(),
            description: String::new(),
            implementation_type: kind,
            target_reference: target.map(String::from),
            resolved_parameters: Default::default(),
            confirmation_required: false,
            impact: String::new(),
            success_criteria: String::new(),
        }
    }

    fn executor(answer: fn() -> Result<CommandOutcome, CommandError>) -> (RemediationExecutor, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CommandRegistry::new();
        registry
            .register(Fake { name: "fix", calls: calls.clone(), answer })
            .unwrap();
        (RemediationExecutor::new(Arc::new(registry)), calls)
    }

    #[tokio::test]
    async fn status_mapping() {
        let (ok, _) = executor(|| Ok(CommandOutcome::success("done")));
        let r = ok.execute(&plan(Some("fix"), ImplementationType::Scripted)).await;
        assert_eq!(r.status, ExecutionStatus::Success);
        assert_eq!(r.output, "done");

        let (failed, _) = executor(|| Ok(CommandOutcome::failure("nope")));
        let r = failed.execute(&plan(Some("fix"), ImplementationType::Scripted)).await;
        assert_eq!(r.status, ExecutionStatus::Failed);
        assert_eq!(r.errors, vec!["nope".to_string()]);

        let (broken, _) = executor(|| Err(CommandError::ExecutionFailed("spawn".into())));
        let r = broken.execute(&plan(Some("fix"), ImplementationType::Scripted)).await;
        assert_eq!(r.status, ExecutionStatus::FailedExecution);
    }

    #[tokio::test]
    async fn missing_command_is_not_invoked() {
        let (exec, calls) = executor(|| Ok(CommandOutcome::success("")));
        let r = exec.execute(&plan(Some("absent"), ImplementationType::Scripted)).await;
        assert_eq!(r.status, ExecutionStatus::FailedDependencyMissing);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn manual_plan_is_a_mapping_failure() {
        let (exec, calls) = executor(|| Ok(CommandOutcome::success("")));
        let r = exec.execute(&plan(Some("fix"), ImplementationType::Manual)).await;
        assert_eq!(r.status, ExecutionStatus::FailedMapping);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
