use fleetmend_rules::FeatureError;

use crate::stage::WorkflowStage;

/// Errors that end a run with `FailedWithError`.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("feature extraction failed: {0}")]
    FeatureExtraction(#[from] FeatureError),

    #[error("cancelled before {0}")]
    Cancelled(WorkflowStage),
}
