//! A model served by an external program.
//!
//! The program receives `{"model", "features", "vector"}` as JSON on stdin
//! and answers with JSON on stdout in any shape [`ModelOutput::from_json`]
//! accepts.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use fleetmend_core::config::ModelConfig;
use fleetmend_core::process::{self, ProcessError, ProcessSpec};

use crate::model::{ModelError, ModelInput, ModelOutput, PredictiveModel};

pub struct SubprocessModel {
    name: String,
    command: String,
    timeout: Duration,
    class_labels: Vec<String>,
    input_features: Vec<String>,
}

impl SubprocessModel {
    pub fn new(name: impl Into<String>, command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            timeout,
            class_labels: Vec::new(),
            input_features: Vec::new(),
        }
    }

    /// Build from configuration. `None` when no model command is set.
    pub fn from_config(config: &ModelConfig) -> Option<Self> {
        let command = config.command.as_ref()?;
        Some(
            Self::new(&config.name, command, Duration::from_secs(config.timeout_secs))
                .with_class_labels(config.class_labels.clone()),
        )
    }

    pub fn with_class_labels(mut self, labels: Vec<String>) -> Self {
        self.class_labels = labels;
        self
    }

    /// Order the model was trained with.
    pub fn with_input_features(mut self, features: Vec<String>) -> Self {
        self.input_features = features;
        self
    }
}

#[async_trait]
impl PredictiveModel for SubprocessModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_features(&self) -> Option<Vec<String>> {
        (!self.input_features.is_empty()).then(|| self.input_features.clone())
    }

    fn class_labels(&self) -> Option<Vec<String>> {
        (!self.class_labels.is_empty()).then(|| self.class_labels.clone())
    }

    async fn infer(&self, input: &ModelInput) -> Result<ModelOutput, ModelError> {
        let request = json!({
            "model": self.name,
            "features": input.feature_names,
            "vector": input.vector,
        });
        let spec = ProcessSpec::new(&self.command, self.timeout).stdin_json(&request);

        let out = process::run(&spec).await.map_err(|e| match e {
            ProcessError::Timeout(d) => ModelError::Timeout(d),
            other => ModelError::Invocation(other.to_string()),
        })?;

        if !out.success {
            return Err(ModelError::Invocation(format!(
                "exit code {:?}: {}",
                out.exit_code,
                out.combined()
            )));
        }

        let stdout = out.stdout.trim();
        debug!(model = %self.name, bytes = stdout.len(), "model answered");
        let value: serde_json::Value = serde_json::from_str(stdout)
            .map_err(|e| ModelError::InvalidOutput(format!("stdout is not JSON: {e}")))?;
        ModelOutput::from_json(&value)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn input() -> ModelInput {
        ModelInput {
            feature_names: vec!["a".into(), "b".into()],
            vector: vec![1.0, 2.0],
        }
    }

    #[tokio::test]
    async fn parses_probabilities_from_stdout() {
        let model = SubprocessModel::new("m", "cat >/dev/null; echo '[[0.25, 0.75]]'", Duration::from_secs(5));
        let out = model.infer(&input()).await.unwrap();
        assert_eq!(out, ModelOutput::Probabilities(vec![0.25, 0.75]));
    }

    #[tokio::test]
    async fn request_carries_vector_and_names() {
        let model = SubprocessModel::new(
            "m",
            r#"grep -q '"features":\["a","b"\],"model":"m","vector":\[1.0,2.0\]' && echo '["ok"]' || echo '["bad"]'"#,
            Duration::from_secs(5),
        );
        let out = model.infer(&input()).await.unwrap();
        assert_eq!(out, ModelOutput::Labels(vec!["ok".into()]));
    }

    #[tokio::test]
    async fn failures_map_to_model_errors() {
        let crash = SubprocessModel::new("m", "exit 2", Duration::from_secs(5));
        assert!(matches!(crash.infer(&input()).await, Err(ModelError::Invocation(_))));

        let garbage = SubprocessModel::new("m", "echo not-json", Duration::from_secs(5));
        assert!(matches!(garbage.infer(&input()).await, Err(ModelError::InvalidOutput(_))));

        let slow = SubprocessModel::new("m", "sleep 5", Duration::from_millis(100));
        assert!(matches!(slow.infer(&input()).await, Err(ModelError::Timeout(_))));
    }

    #[test]
    fn unconfigured_model_is_none() {
        let config = ModelConfig {
            command: None,
            name: "x".into(),
            model_type: "Classifier".into(),
            class_labels: vec![],
            feature_order: vec![],
            failure_class_index: 1,
            timeout_secs: 1,
        };
        assert!(SubprocessModel::from_config(&config).is_none());
    }
}
