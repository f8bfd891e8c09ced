//! Telemetry delivered through an external program: payload JSON on
//! stdin, response JSON on stdout.

use std::time::Duration;

use fleetmend_core::process::{self, ProcessSpec};
use fleetmend_core::TelemetryPayload;

use crate::traits::{TelemetryError, TelemetrySink};

pub struct ProcessSink {
    command: String,
    timeout: Duration,
}

impl ProcessSink {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl TelemetrySink for ProcessSink {
    async fn send(&self, payload: &TelemetryPayload) -> Result<String, TelemetryError> {
        let body = serde_json::to_value(payload)?;
        let spec = ProcessSpec::new(&self.command, self.timeout).stdin_json(&body);
        let out = process::run(&spec)
            .await
            .map_err(|e| TelemetryError::Process(e.to_string()))?;
        if !out.success {
            return Err(TelemetryError::Process(format!(
                "exit code {}: {}",
                out.exit_code.unwrap_or(-1),
                out.combined()
            )));
        }
        Ok(out.stdout)
    }

    fn channel_name(&self) -> &str {
        "process"
    }
}
