//! Normalizes model output into one [`PredictionResult`] per feature set.
//!
//! Never fails as a whole: every problem is recorded on the affected item
//! as `status = Error` with an `error_detail`.

use tracing::{debug, warn};

use fleetmend_core::{FeatureSet, FieldValue, PredictionResult, PredictionStatus, RiskLevel};

use crate::model::{ModelInput, ModelOutput, PredictiveModel};

/// Probability index of the failure class for binary classifiers.
pub const DEFAULT_FAILURE_CLASS_INDEX: usize = 1;

/// Caller-side knobs for vector assembly and label mapping.
#[derive(Debug, Clone)]
pub struct PredictionOptions {
    /// Explicit feature order. Wins over everything else.
    pub feature_order: Option<Vec<String>>,
    /// Declared feature schema, used when no explicit order is given.
    pub schema: Option<Vec<String>>,
    /// Class labels by probability index. Falls back to the model's own labels.
    pub class_labels: Option<Vec<String>>,
    /// Risk is graded on this class's probability, not the winning one.
    pub failure_class_index: usize,
}

impl Default for PredictionOptions {
    fn default() -> Self {
        Self {
            feature_order: None,
            schema: None,
            class_labels: None,
            failure_class_index: DEFAULT_FAILURE_CLASS_INDEX,
        }
    }
}

pub struct PredictionConsumer;

impl PredictionConsumer {
    /// Predict every feature set in order, invoking the model once per item.
    pub async fn predict(
        feature_sets: &[FeatureSet],
        model: Option<&dyn PredictiveModel>,
        model_type: &str,
        options: &PredictionOptions,
    ) -> Vec<PredictionResult> {
        let Some(model) = model else {
            warn!(items = feature_sets.len(), "no model available, marking all predictions as errors");
            return feature_sets
                .iter()
                .map(|fs| {
                    PredictionResult::pending(fs.clone(), model_type)
                        .fail("no predictive model available")
                })
                .collect();
        };

        let declared_order = options
            .feature_order
            .clone()
            .filter(|o| !o.is_empty())
            .or_else(|| options.schema.clone().filter(|s| !s.is_empty()))
            .or_else(|| model.input_features().filter(|f| !f.is_empty()));
        let class_labels = options
            .class_labels
            .clone()
            .filter(|l| !l.is_empty())
            .or_else(|| model.class_labels())
            .unwrap_or_default();

        let mut results = Vec::with_capacity(feature_sets.len());
        for (idx, features) in feature_sets.iter().enumerate() {
            let result = Self::predict_one(
                features,
                model,
                model_type,
                declared_order.as_deref(),
                &class_labels,
                options.failure_class_index,
            )
            .await;
            if let Some(detail) = &result.error_detail {
                warn!(item = idx, model = model.name(), error = %detail, "prediction failed");
            }
            results.push(result);
        }
        results
    }

    async fn predict_one(
        features: &FeatureSet,
        model: &dyn PredictiveModel,
        model_type: &str,
        declared_order: Option<&[String]>,
        class_labels: &[String],
        failure_class_index: usize,
    ) -> PredictionResult {
        let mut result = PredictionResult::pending(features.clone(), model_type);
        let (input, warnings) = vectorize(features, declared_order);
        result.warnings = warnings;

        let output = match model.infer(&input).await {
            Ok(output) => output,
            Err(e) => return result.fail(e.to_string()),
        };

        match output {
            ModelOutput::Probabilities(probs) => match argmax(&probs) {
                Some((idx, p)) => {
                    let label = class_labels
                        .get(idx)
                        .cloned()
                        .unwrap_or_else(|| format!("Class_{idx}"));
                    let failure_probability = probs.get(failure_class_index).copied();
                    debug!(label = %label, confidence = p, failure_probability = ?failure_probability, "prediction");
                    if failure_probability.is_none() {
                        result.warnings.push(format!(
                            "no probability for failure class {failure_class_index}, risk not assessed"
                        ));
                    }
                    result.predicted_label = Some(label);
                    result.confidence = Some(p);
                    result.risk_level = failure_probability.map(RiskLevel::from_probability);
                    result.status = PredictionStatus::Success;
                    result
                }
                None => result.fail("model returned no usable probabilities"),
            },
            ModelOutput::Labels(labels) => match labels.into_iter().next() {
                Some(label) => {
                    result.predicted_label = Some(label);
                    result.status = PredictionStatus::Success;
                    result
                }
                None => result.fail("model returned an empty label array"),
            },
        }
    }
}

/// Build the model input. Names come from `declared_order` when present,
/// else the feature set's own keys in alphabetical order. Missing or
/// non-numeric values become `0.0` and add a warning.
pub fn vectorize(features: &FeatureSet, declared_order: Option<&[String]>) -> (ModelInput, Vec<String>) {
    let names: Vec<String> = match declared_order {
        Some(order) => order.to_vec(),
        None => {
            let mut keys: Vec<String> = features.keys().cloned().collect();
            keys.sort();
            keys
        }
    };

    let mut warnings = Vec::new();
    let vector = names
        .iter()
        .map(|name| match features.get(name) {
            None => {
                warnings.push(format!("feature '{name}' missing, using 0.0"));
                0.0
            }
            Some(FieldValue::Null) => {
                warnings.push(format!("feature '{name}' is null, using 0.0"));
                0.0
            }
            Some(value) => value.as_f64().unwrap_or_else(|| {
                warnings.push(format!("feature '{name}' is not numeric ({value}), using 0.0"));
                0.0
            }),
        })
        .collect();

    (ModelInput { feature_names: names, vector }, warnings)
}

/// Index and value of the largest finite probability. Ties go to the first index.
fn argmax(probs: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &p) in probs.iter().enumerate() {
        if !p.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if p <= b => {}
            _ => best = Some((i, p)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every input and answers from a fixed script.
    struct ScriptedModel {
        answers: Mutex<Vec<Result<ModelOutput, ModelError>>>,
        seen: Mutex<Vec<ModelInput>>,
        input_features: Option<Vec<String>>,
        labels: Option<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(answers: Vec<Result<ModelOutput, ModelError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
                input_features: None,
                labels: None,
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PredictiveModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        fn input_features(&self) -> Option<Vec<String>> {
            self.input_features.clone()
        }

        fn class_labels(&self) -> Option<Vec<String>> {
            self.labels.clone()
        }

        async fn infer(&self, input: &ModelInput) -> Result<ModelOutput, ModelError> {
            self.seen.lock().unwrap().push(input.clone());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ModelError::Invocation("script exhausted".into())))
        }
    }

    fn features(pairs: &[(&str, f64)]) -> FeatureSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::Float(*v)))
            .collect()
    }

    #[tokio::test]
    async fn absent_model_marks_every_item_error() {
        let sets = vec![features(&[("a", 1.0)]), features(&[("b", 2.0)])];
        let results =
            PredictionConsumer::predict(&sets, None, "Classifier", &PredictionOptions::default()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == PredictionStatus::Error));
        assert!(results.iter().all(|r| r.error_detail.is_some()));
        assert_eq!(results[1].input_features, sets[1]);
    }

    #[tokio::test]
    async fn argmax_maps_to_label_with_risk() {
        let mut model = ScriptedModel::new(vec![Ok(ModelOutput::Probabilities(vec![0.2, 0.8]))]);
        model.labels = Some(vec!["Healthy".into(), "Failing".into()]);
        let sets = vec![features(&[("x", 1.0)])];

        let results =
            PredictionConsumer::predict(&sets, Some(&model), "Classifier", &PredictionOptions::default()).await;
        let r = &results[0];
        assert_eq!(r.status, PredictionStatus::Success);
        assert_eq!(r.predicted_label.as_deref(), Some("Failing"));
        assert_eq!(r.confidence, Some(0.8));
        assert_eq!(r.risk_level, Some(RiskLevel::Critical));
    }

    #[tokio::test]
    async fn unlabeled_class_and_tie_break() {
        let model = ScriptedModel::new(vec![
            Ok(ModelOutput::Probabilities(vec![0.1, 0.45, 0.45])),
            Ok(ModelOutput::Labels(vec!["Degraded".into(), "ignored".into()])),
        ]);
        let sets = vec![features(&[("x", 1.0)]), features(&[("x", 2.0)])];
        let opts = PredictionOptions {
            class_labels: Some(vec!["Only".into()]),
            ..Default::default()
        };

        let results = PredictionConsumer::predict(&sets, Some(&model), "Classifier", &opts).await;
        assert_eq!(results[0].predicted_label.as_deref(), Some("Class_1"));
        assert_eq!(results[1].predicted_label.as_deref(), Some("Degraded"));
        assert_eq!(results[1].confidence, None);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn risk_follows_failure_class_probability() {
        let model = ScriptedModel::new(vec![
            Ok(ModelOutput::Probabilities(vec![0.9, 0.1])),
            Ok(ModelOutput::Probabilities(vec![0.2, 0.8])),
            Ok(ModelOutput::Probabilities(vec![0.6])),
        ]);
        let sets = vec![
            features(&[("x", 1.0)]),
            features(&[("x", 2.0)]),
            features(&[("x", 3.0)]),
        ];
        let results =
            PredictionConsumer::predict(&sets, Some(&model), "Classifier", &PredictionOptions::default()).await;

        // Confident "healthy" is low risk.
        assert_eq!(results[0].predicted_label.as_deref(), Some("Class_0"));
        assert_eq!(results[0].confidence, Some(0.9));
        assert_eq!(results[0].risk_level, Some(RiskLevel::Low));
        assert_eq!(results[1].risk_level, Some(RiskLevel::Critical));
        // Single-output model has no failure class to grade.
        assert_eq!(results[2].status, PredictionStatus::Success);
        assert_eq!(results[2].risk_level, None);
        assert_eq!(results[2].warnings.len(), 1);
    }

    #[tokio::test]
    async fn failure_class_index_is_configurable() {
        let model = ScriptedModel::new(vec![Ok(ModelOutput::Probabilities(vec![0.9, 0.1]))]);
        let opts = PredictionOptions {
            failure_class_index: 0,
            ..Default::default()
        };
        let results =
            PredictionConsumer::predict(&[features(&[("x", 1.0)])], Some(&model), "Classifier", &opts).await;
        assert_eq!(results[0].risk_level, Some(RiskLevel::Critical));
    }

    #[tokio::test]
    async fn per_item_errors_do_not_abort_batch() {
        let model = ScriptedModel::new(vec![
            Err(ModelError::Reported("bad input".into())),
            Ok(ModelOutput::Probabilities(vec![0.9, 0.1])),
            Ok(ModelOutput::Probabilities(vec![])),
        ]);
        let sets = vec![
            features(&[("x", 1.0)]),
            features(&[("x", 2.0)]),
            features(&[("x", 3.0)]),
        ];
        let results =
            PredictionConsumer::predict(&sets, Some(&model), "Classifier", &PredictionOptions::default()).await;
        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            [PredictionStatus::Error, PredictionStatus::Success, PredictionStatus::Error]
        );
        assert!(results[0].error_detail.as_deref().unwrap().contains("bad input"));
    }

    #[tokio::test]
    async fn feature_order_precedence() {
        let sets = vec![features(&[("b", 2.0), ("a", 1.0), ("c", 3.0)])];

        // Alphabetical when nothing is declared.
        let model = ScriptedModel::new(vec![Ok(ModelOutput::Labels(vec!["x".into()]))]);
        PredictionConsumer::predict(&sets, Some(&model), "m", &PredictionOptions::default()).await;
        assert_eq!(model.seen.lock().unwrap()[0].vector, vec![1.0, 2.0, 3.0]);

        // Model-reported order beats alphabetical.
        let mut model = ScriptedModel::new(vec![Ok(ModelOutput::Labels(vec!["x".into()]))]);
        model.input_features = Some(vec!["c".into(), "a".into()]);
        PredictionConsumer::predict(&sets, Some(&model), "m", &PredictionOptions::default()).await;
        assert_eq!(model.seen.lock().unwrap()[0].vector, vec![3.0, 1.0]);

        // Schema beats model order, explicit order beats schema.
        let mut model = ScriptedModel::new(vec![
            Ok(ModelOutput::Labels(vec!["x".into()])),
            Ok(ModelOutput::Labels(vec!["x".into()])),
        ]);
        model.input_features = Some(vec!["c".into()]);
        let schema = PredictionOptions {
            schema: Some(vec!["b".into()]),
            ..Default::default()
        };
        PredictionConsumer::predict(&sets, Some(&model), "m", &schema).await;
        let explicit = PredictionOptions {
            feature_order: Some(vec!["a".into(), "b".into()]),
            schema: Some(vec!["b".into()]),
            ..Default::default()
        };
        PredictionConsumer::predict(&sets, Some(&model), "m", &explicit).await;
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].vector, vec![2.0]);
        assert_eq!(seen[1].vector, vec![1.0, 2.0]);
    }

    #[test]
    fn missing_and_invalid_features_become_zero_with_warning() {
        let mut fs = features(&[("a", 1.0)]);
        fs.insert("b", "not a number");
        let order = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        let (input, warnings) = vectorize(&fs, Some(&order));
        assert_eq!(input.vector, vec![1.0, 0.0, 0.0]);
        assert_eq!(warnings.len(), 2);
    }
}
