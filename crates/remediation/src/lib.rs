//! Remediation: plan resolution, approval, execution and validation.

pub mod approval;
pub mod catalog;
pub mod command;
pub mod executor;
pub mod registry;
pub mod shell;
pub mod template;
pub mod validation;

pub use approval::{ApprovalCallback, ApprovalDecision, ApprovalGate, ApprovalPolicy, AutoApprove, DryRun};
pub use catalog::RemediationPlanner;
pub use command::{CommandError, CommandOutcome, CommandRequest, RemediationCommand};
pub use executor::RemediationExecutor;
pub use registry::{CommandRegistry, RegistryError};
pub use shell::{discover_commands, ShellCommand};
pub use validation::{
    CommandTester, ResultTester, RuleStepResolver, StepResolver, ValidationEngine, ValidationRules,
    ValidationStep,
};
