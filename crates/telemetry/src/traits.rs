//! Sink trait definition and shared error types.

use fleetmend_core::TelemetryPayload;

/// Errors that can occur during telemetry delivery.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("reporter process failed: {0}")]
    Process(String),

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A delivery channel for outcome telemetry.
#[async_trait::async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Deliver a payload. Returns the raw response body (may be empty).
    async fn send(&self, payload: &TelemetryPayload) -> Result<String, TelemetryError>;

    /// Human-readable name for this channel (e.g., "webhook", "process").
    fn channel_name(&self) -> &str;
}
