//! Static checks over a [`DefinitionSet`].
//!
//! Errors mark definitions that cannot behave as written (a pattern with an
//! empty keyword list matches every record, an unknown operator silently
//! degrades to equality). Warnings mark definitions that load but are
//! probably not what the author meant.

pub(crate) mod fuzzy;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use fleetmend_core::ImplementationType;

use crate::definition::{DefinitionSet, KEYWORD_MATCH};
use crate::recommend::{operator_of, LEGACY_EXISTS_SUFFIX, OPERATORS};
use fuzzy::fuzzy_match;

// ── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintResult {
    pub valid: bool,
    pub errors: Vec<LintError>,
    pub warnings: Vec<LintWarning>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintError {
    /// Location, e.g. `"rules[2].ifCondition.CpuUsage"`.
    pub path: String,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintWarning {
    pub path: String,
    pub message: String,
}

impl LintResult {
    fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(LintError {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }

    fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) {
        self.valid = false;
        self.errors.push(LintError {
            path: path.into(),
            message: message.into(),
            suggestion: suggestion.map(|s| format!("Did you mean '{s}'?")),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(LintWarning {
            path: path.into(),
            message: message.into(),
        });
    }
}

// ── Public API ──────────────────────────────────────────────────────

pub fn lint_definitions(set: &DefinitionSet) -> LintResult {
    let mut result = LintResult::new();
    check_patterns(set, &mut result);
    check_rules(set, &mut result);
    check_plans(set, &mut result);
    result
}

fn check_patterns(set: &DefinitionSet, result: &mut LintResult) {
    let mut seen = HashSet::new();
    for (i, pattern) in set.patterns.iter().enumerate() {
        let path = format!("patterns[{i}]");
        if pattern.name.trim().is_empty() {
            result.error(format!("{path}.name"), "pattern name must not be empty");
        } else if !seen.insert(pattern.name.as_str()) {
            result.error(
                format!("{path}.name"),
                format!("duplicate pattern name '{}'", pattern.name),
            );
        }

        if !pattern.is_keyword_match() {
            let suggestion = fuzzy_match(&pattern.pattern_type, &[KEYWORD_MATCH]);
            result.warn(
                format!("{path}.type"),
                match suggestion {
                    Some(s) => format!(
                        "unsupported pattern type '{}' is skipped. Did you mean '{s}'?",
                        pattern.pattern_type
                    ),
                    None => format!(
                        "unsupported pattern type '{}' is skipped",
                        pattern.pattern_type
                    ),
                },
            );
        }

        if pattern.conditions.is_empty() {
            result.warn(format!("{path}.conditions"), "pattern has no conditions and never matches");
        }

        for (j, cond) in pattern.conditions.iter().enumerate() {
            let cpath = format!("{path}.conditions[{j}]");
            if cond.property.trim().is_empty() {
                result.error(format!("{cpath}.property"), "property must not be empty");
            }
            if cond.keywords.is_empty() || cond.keywords.iter().any(|k| k.is_empty()) {
                result.error(
                    format!("{cpath}.keywords"),
                    "keywords must be non-empty strings, otherwise every record matches",
                );
            }
            if cond.min_occurrences == 0 {
                result.warn(
                    format!("{cpath}.minOccurrences"),
                    "minOccurrences of 0 makes the condition always pass",
                );
            }
        }
    }
}

fn check_rules(set: &DefinitionSet, result: &mut LintResult) {
    let pattern_names: Vec<&str> = set.patterns.iter().map(|p| p.name.as_str()).collect();

    for (i, rule) in set.rules.iter().enumerate() {
        let path = format!("rules[{i}]");

        if rule.if_condition.is_empty() {
            result.warn(format!("{path}.ifCondition"), "rule has no conditions and never matches");
        }
        if rule.then_recommend.is_empty() {
            result.warn(format!("{path}.thenRecommend"), "rule recommends nothing");
        }

        for (key, value) in &rule.if_condition {
            let cpath = format!("{path}.ifCondition.{key}");

            if key.strip_suffix(LEGACY_EXISTS_SUFFIX).is_some_and(|p| !p.is_empty()) {
                continue;
            }

            if let Some((operator, operand)) = operator_of(value) {
                let known = OPERATORS.iter().any(|o| o.eq_ignore_ascii_case(&operator));
                if !known {
                    result.error_with_suggestion(
                        cpath.clone(),
                        format!("unknown operator '{operator}' is compared by equality"),
                        fuzzy_match(&operator, OPERATORS),
                    );
                } else if operator.eq_ignore_ascii_case("GreaterThan") {
                    let numeric = match operand {
                        serde_json::Value::Number(_) => true,
                        serde_json::Value::String(s) => s.trim().parse::<f64>().is_ok(),
                        _ => false,
                    };
                    if !numeric {
                        result.error(cpath.clone(), "GreaterThan needs a numeric value");
                    }
                }
            }

            if key == "PatternName" {
                if let Some(name) = value.as_str() {
                    if !pattern_names.contains(&name) {
                        let hint = fuzzy_match(name, &pattern_names)
                            .map(|s| format!(". Did you mean '{s}'?"))
                            .unwrap_or_default();
                        result.warn(cpath, format!("no pattern named '{name}' is defined{hint}"));
                    }
                }
            }
        }

        for (j, rec) in rule.then_recommend.iter().enumerate() {
            if rec.id.trim().is_empty() {
                result.error(format!("{path}.thenRecommend[{j}].id"), "recommendation id must not be empty");
            }
        }
    }
}

fn check_plans(set: &DefinitionSet, result: &mut LintResult) {
    for (key, plan) in &set.plans {
        let path = format!("plans.{key}");
        if plan.action_id.trim().is_empty() {
            result.error(format!("{path}.actionId"), "actionId must not be empty");
        }
        if plan.implementation_type == ImplementationType::Scripted
            && plan.target_reference.as_deref().map_or(true, |t| t.trim().is_empty())
        {
            result.error(
                format!("{path}.targetReference"),
                "scripted plans need a targetReference",
            );
        }
    }
}
