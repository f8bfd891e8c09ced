//! Definition document types: patterns, recommendation rules, plan templates
//! and feature definitions.
//!
//! Keys are camelCase on the wire. PascalCase aliases are accepted so that
//! definition files exported by older tooling keep loading.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use fleetmend_core::{ImplementationType, Recommendation};

// ── Patterns ────────────────────────────────────────────────────────

/// The only pattern type the matcher evaluates.
pub const KEYWORD_MATCH: &str = "KeywordMatch";

/// A named keyword-based detector over diagnostic records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternDefinition {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description")]
    pub description: String,
    /// Pattern type. Anything other than `KeywordMatch` is skipped.
    #[serde(rename = "type", alias = "Type", default = "default_pattern_type")]
    pub pattern_type: String,
    #[serde(default, alias = "Conditions")]
    pub conditions: Vec<PatternCondition>,
}

fn default_pattern_type() -> String {
    KEYWORD_MATCH.to_string()
}

impl PatternDefinition {
    pub fn is_keyword_match(&self) -> bool {
        self.pattern_type.eq_ignore_ascii_case(KEYWORD_MATCH)
    }
}

/// One clause of a pattern: at least `min_occurrences` records must carry
/// every keyword in `property`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternCondition {
    #[serde(alias = "Property")]
    pub property: String,
    #[serde(default, alias = "Keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_min_occurrences", alias = "MinOccurrences")]
    pub min_occurrences: usize,
}

fn default_min_occurrences() -> usize {
    1
}

// ── Recommendation rules ────────────────────────────────────────────

/// Condition → recommendation list. Condition values are either literals
/// (equality) or operator objects, see [`crate::recommend::Condition`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRule {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "IfCondition")]
    pub if_condition: IndexMap<String, serde_json::Value>,
    #[serde(default, alias = "ThenRecommend")]
    pub then_recommend: Vec<Recommendation>,
}

// ── Plan templates ──────────────────────────────────────────────────

/// Constant plan template, keyed by recommendation id or pattern name.
///
/// String parameters may reference properties of the originating item as
/// `${PropertyName}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanTemplate {
    #[serde(alias = "ActionId")]
    pub action_id: String,
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(default, alias = "Description")]
    pub description: String,
    #[serde(default, alias = "ImplementationType")]
    pub implementation_type: ImplementationType,
    #[serde(default, alias = "TargetReference", alias = "Script")]
    pub target_reference: Option<String>,
    #[serde(default, alias = "Parameters")]
    pub parameters: IndexMap<String, serde_json::Value>,
    #[serde(default = "default_true", alias = "ConfirmationRequired")]
    pub confirmation_required: bool,
    #[serde(default, alias = "Impact")]
    pub impact: String,
    #[serde(default, alias = "SuccessCriteria")]
    pub success_criteria: String,
}

fn default_true() -> bool {
    true
}

// ── Definition document ─────────────────────────────────────────────

/// Top-level definitions document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSet {
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,
    #[serde(default)]
    pub rules: Vec<RecommendationRule>,
    #[serde(default)]
    pub plans: IndexMap<String, PlanTemplate>,
}

// ── Feature definition ──────────────────────────────────────────────

pub const VECTORIZATION_KEYWORD_COUNT: &str = "KeywordCount";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DateTimeComponent {
    DayOfWeek,
    HourOfDay,
}

/// Declarative feature definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDefinition {
    #[serde(default, alias = "TextProperties")]
    pub text_properties: Vec<TextFeature>,
    #[serde(default, alias = "NumericalProperties")]
    pub numerical_properties: Vec<NumericFeature>,
    #[serde(default, alias = "DateTimeProperties")]
    pub date_time_properties: Vec<DateTimeFeature>,
}

impl FeatureDefinition {
    pub fn is_empty(&self) -> bool {
        self.text_properties.is_empty()
            && self.numerical_properties.is_empty()
            && self.date_time_properties.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextFeature {
    #[serde(alias = "Name", alias = "Property")]
    pub property: String,
    #[serde(default = "default_vectorization", alias = "Vectorization", alias = "Type")]
    pub vectorization: String,
    #[serde(default, alias = "Keywords")]
    pub keywords: Vec<String>,
}

fn default_vectorization() -> String {
    VECTORIZATION_KEYWORD_COUNT.to_string()
}

impl TextFeature {
    pub fn is_keyword_count(&self) -> bool {
        self.vectorization.eq_ignore_ascii_case(VECTORIZATION_KEYWORD_COUNT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NumericFeature {
    #[serde(alias = "Name", alias = "Property")]
    pub property: String,
    /// Declared normalization kind. Recorded but not applied.
    #[serde(default, alias = "Normalization")]
    pub normalization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeFeature {
    #[serde(alias = "Name", alias = "Property")]
    pub property: String,
    #[serde(
        default = "default_components",
        alias = "Extract",
        alias = "Components"
    )]
    pub extract: Vec<DateTimeComponent>,
}

fn default_components() -> Vec<DateTimeComponent> {
    vec![DateTimeComponent::DayOfWeek, DateTimeComponent::HourOfDay]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_defaults() {
        let p: PatternDefinition = serde_json::from_str(
            r#"{"name": "X", "conditions": [{"property": "Message", "keywords": ["a"]}]}"#,
        )
        .unwrap();
        assert!(p.is_keyword_match());
        assert_eq!(p.conditions[0].min_occurrences, 1);
    }

    #[test]
    fn pascal_case_rule_loads() {
        let r: RecommendationRule = serde_json::from_str(
            r#"{
                "Name": "net",
                "IfCondition": {"PatternName": "NetworkConnectionFailure"},
                "ThenRecommend": [{"Id": "REC_NET_DNS", "Title": "Check DNS"}]
            }"#,
        )
        .unwrap();
        assert_eq!(r.if_condition.len(), 1);
        assert_eq!(r.then_recommend[0].id, "REC_NET_DNS");
    }

    #[test]
    fn plan_template_requires_confirmation_by_default() {
        let t: PlanTemplate =
            serde_json::from_str(r#"{"actionId": "A", "title": "T"}"#).unwrap();
        assert!(t.confirmation_required);
        assert_eq!(t.implementation_type, ImplementationType::Manual);
    }

    #[test]
    fn feature_definition_yaml() {
        let def: FeatureDefinition = serde_yaml::from_str(
            r#"
textProperties:
  - property: Message
    keywords: [error, timeout]
numericalProperties:
  - property: CpuUsage
    normalization: MinMax
dateTimeProperties:
  - property: TimeCreated
    extract: [HourOfDay]
"#,
        )
        .unwrap();
        assert!(def.text_properties[0].is_keyword_count());
        assert_eq!(def.numerical_properties[0].normalization.as_deref(), Some("MinMax"));
        assert_eq!(def.date_time_properties[0].extract, vec![DateTimeComponent::HourOfDay]);
    }
}
