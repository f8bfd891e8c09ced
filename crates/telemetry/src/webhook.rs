//! HTTP telemetry endpoint.
//!
//! Posts the payload as JSON. Environment variable references
//! (`${VAR_NAME}`) in the URL and header values are resolved at
//! construction time.

use std::collections::HashMap;
use std::time::Duration;

use fleetmend_core::TelemetryPayload;

use crate::traits::{TelemetryError, TelemetrySink};

#[derive(Debug)]
pub struct WebhookSink {
    /// Target URL (env vars already resolved).
    url: String,
    /// Custom headers to include on every request.
    headers: HashMap<String, String>,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookSink {
    /// Missing env vars in `url` or header values produce a
    /// [`TelemetryError::Config`] error.
    pub fn new(
        url: &str,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let resolved_url = resolve_env_vars(url)?;

        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in &headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: resolved_url,
            headers: resolved_headers,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl TelemetrySink for WebhookSink {
    async fn send(&self, payload: &TelemetryPayload) -> Result<String, TelemetryError> {
        let body = serde_json::to_string(payload)?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let body_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if !status.is_success() {
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "telemetry endpoint returned non-2xx status"
            );
            return Err(TelemetryError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        tracing::debug!(url = %self.url, status = %status, "telemetry delivered");
        Ok(body_text)
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, TelemetryError> {
    let mut resolved = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find("${") {
        resolved.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after.find('}').ok_or_else(|| {
            TelemetryError::Config(format!("unclosed env var reference in: {input}"))
        })?;
        let name = &after[..close];
        let value = std::env::var(name)
            .map_err(|_| TelemetryError::Config(format!("env var not found: {name}")))?;
        resolved.push_str(&value);
        rest = &after[close + 1..];
    }
    resolved.push_str(rest);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("FLEETMEND_TEST_TELEMETRY_HOST", "collector.internal");
        let result = resolve_env_vars("https://${FLEETMEND_TEST_TELEMETRY_HOST}/outcomes").unwrap();
        assert_eq!(result, "https://collector.internal/outcomes");
        std::env::remove_var("FLEETMEND_TEST_TELEMETRY_HOST");
    }

    #[test]
    fn resolve_env_vars_missing_and_unclosed() {
        match resolve_env_vars("https://${ABSOLUTELY_NOT_SET_98765}/x") {
            Err(TelemetryError::Config(msg)) => assert!(msg.contains("ABSOLUTELY_NOT_SET_98765")),
            other => panic!("expected Config error, got: {other:?}"),
        }
        match resolve_env_vars("https://${UNCLOSED/x") {
            Err(TelemetryError::Config(msg)) => assert!(msg.contains("unclosed")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn headers_are_resolved() {
        std::env::set_var("FLEETMEND_TEST_TELEMETRY_KEY", "secret-key-123");
        let headers = HashMap::from([
            ("X-Api-Key".to_string(), "${FLEETMEND_TEST_TELEMETRY_KEY}".to_string()),
            ("X-Static".to_string(), "fixed-value".to_string()),
        ]);
        let sink = WebhookSink::new("http://127.0.0.1:9/hook", headers, Duration::from_secs(1)).unwrap();
        assert_eq!(sink.headers["X-Api-Key"], "secret-key-123");
        assert_eq!(sink.headers["X-Static"], "fixed-value");
        assert_eq!(sink.channel_name(), "webhook");
        std::env::remove_var("FLEETMEND_TEST_TELEMETRY_KEY");
    }
}
