//! Wire shapes exchanged with the learning/retraining endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome report for one remediation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPayload {
    pub server_name: String,
    pub timestamp: DateTime<Utc>,
    /// Pattern or recommendation id that triggered the remediation.
    pub error_type: String,
    pub action: String,
    /// `success` or the failing execution/validation status.
    pub outcome: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Acknowledgment from the endpoint. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResponse {
    #[serde(default, alias = "PendingRetrainRequests", alias = "pending_retrain_requests")]
    pub pending_retrain_requests: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}
