//! Model collaborator contract.
//!
//! A model receives an ordered numeric vector (with the feature names that
//! produced it) and returns either a class-probability vector or a direct
//! label array. Transport is up to the implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model could not be reached or crashed.
    #[error("model invocation failed: {0}")]
    Invocation(String),

    #[error("model timed out after {0:?}")]
    Timeout(Duration),

    /// The model answered with something that is neither probabilities nor labels.
    #[error("unrecognized model output: {0}")]
    InvalidOutput(String),

    /// The model answered with an explicit error.
    #[error("model reported error: {0}")]
    Reported(String),
}

/// Input handed to the model for one feature set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelInput {
    pub feature_names: Vec<String>,
    pub vector: Vec<f64>,
}

/// Raw model output before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Probabilities(Vec<f64>),
    Labels(Vec<String>),
}

impl ModelOutput {
    /// Interpret a JSON answer.
    ///
    /// - numeric array → probabilities (a 2-D array contributes its first row)
    /// - string array or single string → labels
    /// - object with `error` → [`ModelError::Reported`]
    /// - object with `probabilities` / `labels` (and common variants) → unwrapped
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ModelError> {
        use serde_json::Value;

        match value {
            Value::Array(items) => {
                let Some(first) = items.first() else {
                    return Err(ModelError::InvalidOutput("empty array".to_string()));
                };
                match first {
                    Value::Array(_) => Self::from_json(first),
                    Value::Number(_) => items
                        .iter()
                        .map(|v| {
                            v.as_f64().ok_or_else(|| {
                                ModelError::InvalidOutput(format!("non-numeric probability {v}"))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map(ModelOutput::Probabilities),
                    Value::String(_) => Ok(ModelOutput::Labels(
                        items
                            .iter()
                            .map(|v| match v {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect(),
                    )),
                    other => Err(ModelError::InvalidOutput(format!(
                        "array of unsupported elements, first is {other}"
                    ))),
                }
            }
            Value::String(s) => Ok(ModelOutput::Labels(vec![s.clone()])),
            Value::Object(obj) => {
                let get = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k));
                if let Some(err) = get(&["error", "Error"]) {
                    let msg = match err {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    return Err(ModelError::Reported(msg));
                }
                if let Some(p) = get(&["probabilities", "Probabilities", "probability", "predict_proba"]) {
                    return Self::from_json(p);
                }
                if let Some(l) = get(&["labels", "Labels", "label", "Label", "prediction", "predictions"]) {
                    return Self::from_json(l);
                }
                Err(ModelError::InvalidOutput(
                    "object without probabilities or labels".to_string(),
                ))
            }
            other => Err(ModelError::InvalidOutput(format!("unexpected {other}"))),
        }
    }
}

/// A classification-style model.
#[async_trait]
pub trait PredictiveModel: Send + Sync {
    /// Handle passed to the model runtime.
    fn name(&self) -> &str;

    /// Input order the model was trained with, when it reports one.
    fn input_features(&self) -> Option<Vec<String>> {
        None
    }

    /// Class labels indexed by probability position, when the model reports them.
    fn class_labels(&self) -> Option<Vec<String>> {
        None
    }

    /// Run inference for one feature vector.
    async fn infer(&self, input: &ModelInput) -> Result<ModelOutput, ModelError>;
}
