//! Detection-side results: pattern matches, predictions and recommendations.

use serde::{Deserialize, Serialize};

use crate::record::{DiagnosticRecord, FeatureSet};

/// Maximum number of example records kept per pattern match.
pub const MAX_EXAMPLE_ITEMS: usize = 5;

// ── Pattern matches ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub pattern_name: String,
    pub description: String,
    pub matched_item_count: usize,
    /// At most [`MAX_EXAMPLE_ITEMS`] of the matched records.
    pub example_items: Vec<DiagnosticRecord>,
}

// ── Predictions ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PredictionStatus {
    Pending,
    Success,
    Error,
}

/// Coarse risk bucket derived from a prediction's confidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_probability(p: f64) -> Self {
        if p >= 0.75 {
            RiskLevel::Critical
        } else if p >= 0.5 {
            RiskLevel::High
        } else if p >= 0.25 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

/// Normalized model output for one feature set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub input_features: FeatureSet,
    pub predicted_label: Option<String>,
    /// Probability of the predicted class. None for direct-label models.
    pub confidence: Option<f64>,
    pub model_type: String,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

impl PredictionResult {
    pub fn pending(input_features: FeatureSet, model_type: impl Into<String>) -> Self {
        Self {
            input_features,
            predicted_label: None,
            confidence: None,
            model_type: model_type.into(),
            status: PredictionStatus::Pending,
            error_detail: None,
            warnings: Vec::new(),
            risk_level: None,
        }
    }

    /// Mark as failed. Label and confidence are cleared.
    pub fn fail(mut self, detail: impl Into<String>) -> Self {
        self.status = PredictionStatus::Error;
        self.error_detail = Some(detail.into());
        self.predicted_label = None;
        self.confidence = None;
        self.risk_level = None;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == PredictionStatus::Success
    }
}

// ── Recommendations ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Severity {
    #[serde(alias = "info", alias = "INFO")]
    Info,
    #[serde(alias = "low", alias = "LOW")]
    Low,
    #[default]
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[serde(alias = "critical", alias = "CRITICAL")]
    Critical,
}

/// A suggested remediation sourced from a rule definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(default, alias = "Description")]
    pub description: String,
    #[serde(default, alias = "Severity")]
    pub severity: Severity,
    #[serde(default, alias = "Confidence", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Recommendations produced for one input item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSet {
    pub item: DiagnosticRecord,
    pub recommendations: Vec<Recommendation>,
}
