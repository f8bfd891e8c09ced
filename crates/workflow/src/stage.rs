use std::fmt;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Started,
    FeatureExtraction,
    PatternDetection,
    Prediction,
    Recommendation,
    PlanResolution,
    ApprovalAndExecution,
    Validation,
    TelemetryReport,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Started => "Started",
            WorkflowStage::FeatureExtraction => "FeatureExtraction",
            WorkflowStage::PatternDetection => "PatternDetection",
            WorkflowStage::Prediction => "Prediction",
            WorkflowStage::Recommendation => "Recommendation",
            WorkflowStage::PlanResolution => "PlanResolution",
            WorkflowStage::ApprovalAndExecution => "ApprovalAndExecution",
            WorkflowStage::Validation => "Validation",
            WorkflowStage::TelemetryReport => "TelemetryReport",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
