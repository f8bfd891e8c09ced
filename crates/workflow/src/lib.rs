//! The fleet remediation workflow.
//!
//! Drives feature extraction, pattern detection, prediction,
//! recommendation, plan resolution, approval-gated execution, validation
//! and telemetry for one batch of diagnostic records, and returns a
//! [`WorkflowSummary`](fleetmend_core::WorkflowSummary).

pub mod error;
pub mod orchestrator;
pub mod request;
pub mod stage;

pub use error::WorkflowError;
pub use orchestrator::WorkflowOrchestrator;
pub use request::WorkflowRequest;
pub use stage::WorkflowStage;
