//! Best-effort outcome reporting.
//!
//! Nothing here fails the caller: a missing sink, a delivery error or an
//! empty or unparseable response all degrade to `None` with a warning.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use fleetmend_core::config::TelemetryConfig;
use fleetmend_core::{TelemetryPayload, TelemetryResponse};

use crate::command::ProcessSink;
use crate::traits::TelemetrySink;
use crate::webhook::WebhookSink;

pub struct TelemetryFeedback {
    sink: Option<Box<dyn TelemetrySink>>,
}

impl TelemetryFeedback {
    pub fn new(sink: Box<dyn TelemetrySink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// No sink: every report is a no-op.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Webhook when a URL is configured, otherwise a process sink when a
    /// command is configured, otherwise disabled. A webhook that cannot be
    /// built (unset env var in the URL, say) disables telemetry.
    pub fn from_config(config: &TelemetryConfig, headers: HashMap<String, String>) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        if let Some(url) = &config.url {
            return match WebhookSink::new(url, headers, timeout) {
                Ok(sink) => Self::new(Box::new(sink)),
                Err(e) => {
                    warn!(error = %e, "telemetry webhook misconfigured, telemetry disabled");
                    Self::disabled()
                }
            };
        }
        if let Some(command) = &config.command {
            return Self::new(Box::new(ProcessSink::new(command, timeout)));
        }
        Self::disabled()
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn report(&self, payload: &TelemetryPayload) -> Option<TelemetryResponse> {
        let Some(sink) = &self.sink else {
            debug!(action = %payload.action, "telemetry disabled, not reporting");
            return None;
        };

        let body = match sink.send(payload).await {
            Ok(body) => body,
            Err(e) => {
                warn!(channel = sink.channel_name(), action = %payload.action, error = %e, "telemetry delivery failed");
                return None;
            }
        };

        let trimmed = body.trim();
        if trimmed.is_empty() {
            warn!(channel = sink.channel_name(), action = %payload.action, "telemetry endpoint returned an empty response");
            return None;
        }
        match serde_json::from_str::<TelemetryResponse>(trimmed) {
            Ok(response) => {
                debug!(
                    channel = sink.channel_name(),
                    pending_retrain_requests = response.pending_retrain_requests.len(),
                    "telemetry acknowledged"
                );
                Some(response)
            }
            Err(e) => {
                warn!(channel = sink.channel_name(), error = %e, "unparseable telemetry response");
                None
            }
        }
    }
}
