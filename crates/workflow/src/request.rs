use std::sync::Arc;

use tracing::{info, warn};

use fleetmend_core::{ApprovalMode, Config, DiagnosticRecord};
use fleetmend_predict::{PredictionOptions, PredictiveModel, SubprocessModel};
use fleetmend_remediation::ValidationRules;
use fleetmend_rules::loader::{load_definitions, load_feature_definition};
use fleetmend_rules::{defaults, DefinitionSet, FeatureDefinition};

/// Everything one run needs besides the long-lived collaborators.
pub struct WorkflowRequest {
    pub input_records: Vec<DiagnosticRecord>,
    /// None skips the prediction stage.
    pub model: Option<Arc<dyn PredictiveModel>>,
    pub model_type: String,
    pub prediction_options: PredictionOptions,
    /// None uses the built-in features.
    pub feature_definition: Option<FeatureDefinition>,
    pub definitions: DefinitionSet,
    pub approval_mode: ApprovalMode,
    /// Some means validation is required for this batch.
    pub validation_rules: Option<ValidationRules>,
}

impl WorkflowRequest {
    /// Built-in definitions, no model, Assisted approval, no validation.
    pub fn new(input_records: Vec<DiagnosticRecord>) -> Self {
        Self {
            input_records,
            model: None,
            model_type: "Classifier".to_string(),
            prediction_options: PredictionOptions::default(),
            feature_definition: None,
            definitions: defaults::definition_set(),
            approval_mode: ApprovalMode::Assisted,
            validation_rules: None,
        }
    }

    /// Resolve every file and collaborator reference in `config`.
    /// Unreadable documents fall back to defaults with a warning.
    pub fn from_config(input_records: Vec<DiagnosticRecord>, config: &Config) -> Self {
        let (definitions, _) = load_definitions(config.definitions.definitions_path.as_deref());
        let feature_definition = config
            .definitions
            .feature_definition_path
            .as_deref()
            .and_then(load_feature_definition);
        let validation_rules = config
            .definitions
            .validation_rules_path
            .as_deref()
            .and_then(|path| match ValidationRules::load(path) {
                Ok(rules) => Some(rules),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read validation rules, validation disabled");
                    None
                }
            });

        let model = SubprocessModel::from_config(&config.model)
            .map(|m| Arc::new(m) as Arc<dyn PredictiveModel>);
        if model.is_none() {
            info!("no model command configured, prediction stage will be skipped");
        }

        let non_empty = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
        Self {
            input_records,
            model,
            model_type: config.model.model_type.clone(),
            prediction_options: PredictionOptions {
                feature_order: non_empty(&config.model.feature_order),
                schema: None,
                class_labels: non_empty(&config.model.class_labels),
                failure_class_index: config.model.failure_class_index,
            },
            feature_definition,
            definitions,
            approval_mode: config.execution.approval_mode,
            validation_rules,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn PredictiveModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_definitions(mut self, definitions: DefinitionSet) -> Self {
        self.definitions = definitions;
        self
    }

    pub fn with_feature_definition(mut self, definition: FeatureDefinition) -> Self {
        self.feature_definition = Some(definition);
        self
    }

    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    pub fn with_validation_rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = Some(rules);
        self
    }
}
