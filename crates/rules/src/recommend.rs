//! Rule-based recommendation engine.
//!
//! Rules are evaluated in definition order. A rule matches an item only when
//! every key of its `ifCondition` is satisfied. Matching rules append their
//! recommendations until the per-item cap is reached, after which no further
//! rules are evaluated for that item.

use tracing::debug;

use fleetmend_core::{DiagnosticRecord, FieldValue, Recommendation, RecommendationSet};

use crate::definition::RecommendationRule;

/// Legacy key suffix meaning "property exists and is non-zero".
pub const LEGACY_EXISTS_SUFFIX: &str = "_Exists";

/// Comparison operators accepted in condition objects.
pub const OPERATORS: &[&str] = &["Equals", "GreaterThan", "Exists"];

// ── Conditions ──────────────────────────────────────────────────────

/// A single parsed `ifCondition` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Literal comparison. Strings compare case-sensitively, numbers numerically.
    Equals {
        property: String,
        expected: serde_json::Value,
    },
    /// Numeric `item > threshold`. Non-numeric values never match.
    GreaterThan { property: String, threshold: f64 },
    /// `expected = true`: present, not null, not empty and not zero.
    /// `expected = false`: absent or falsy. The one condition that matches
    /// an item lacking its key, so rules can fire on missing properties.
    Exists { property: String, expected: bool },
}

impl Condition {
    /// Parse one `ifCondition` entry.
    ///
    /// Accepted shapes:
    /// - `"Prop": <literal>` → Equals
    /// - `"Prop": {"operator": "GreaterThan", "value": 5}`
    /// - `"Prop": {"GreaterThan": 5}`
    /// - `"Prop_Exists": true` → Exists on `Prop`
    ///
    /// Objects naming an unknown operator fall through to equality against
    /// the object itself.
    pub fn parse(key: &str, value: &serde_json::Value) -> Self {
        if let Some(property) = key.strip_suffix(LEGACY_EXISTS_SUFFIX) {
            if !property.is_empty() {
                return Condition::Exists {
                    property: property.to_string(),
                    expected: json_truthy(value),
                };
            }
        }

        if let Some((operator, operand)) = operator_of(value) {
            match operator.to_ascii_lowercase().as_str() {
                "equals" => {
                    return Condition::Equals {
                        property: key.to_string(),
                        expected: operand.clone(),
                    }
                }
                "greaterthan" => {
                    let threshold = match operand {
                        serde_json::Value::Number(n) => n.as_f64(),
                        serde_json::Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    };
                    return Condition::GreaterThan {
                        property: key.to_string(),
                        threshold: threshold.unwrap_or(f64::NAN),
                    };
                }
                "exists" => {
                    return Condition::Exists {
                        property: key.to_string(),
                        expected: json_truthy(operand),
                    }
                }
                _ => {}
            }
        }

        Condition::Equals {
            property: key.to_string(),
            expected: value.clone(),
        }
    }

    pub fn property(&self) -> &str {
        match self {
            Condition::Equals { property, .. }
            | Condition::GreaterThan { property, .. }
            | Condition::Exists { property, .. } => property,
        }
    }

    pub fn is_satisfied_by(&self, item: &DiagnosticRecord) -> bool {
        match self {
            Condition::Exists { property, expected } => {
                let present = item.get(property).is_some_and(FieldValue::is_truthy);
                present == *expected
            }
            Condition::Equals { property, expected } => item
                .get(property)
                .is_some_and(|actual| values_equal(actual, expected)),
            Condition::GreaterThan { property, threshold } => item
                .get(property)
                .and_then(FieldValue::as_f64)
                .is_some_and(|actual| actual > *threshold),
        }
    }
}

static IMPLICIT_OPERAND: serde_json::Value = serde_json::Value::Bool(true);

/// Extract `(operator, operand)` from an operator object, if it is one.
pub(crate) fn operator_of(value: &serde_json::Value) -> Option<(String, &serde_json::Value)> {
    let obj = value.as_object()?;
    let op_key = obj
        .keys()
        .find(|k| k.eq_ignore_ascii_case("operator"))
        .cloned();
    if let Some(op_key) = op_key {
        let operator = obj.get(&op_key)?.as_str()?.to_string();
        let operand = obj
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("value"))
            .map(|(_, v)| v)
            .unwrap_or(&IMPLICIT_OPERAND);
        return Some((operator, operand));
    }
    if obj.len() == 1 {
        let (operator, operand) = obj.iter().next()?;
        return Some((operator.clone(), operand));
    }
    None
}

fn json_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "false" | "0"),
        _ => true,
    }
}

fn values_equal(actual: &FieldValue, expected: &serde_json::Value) -> bool {
    match expected {
        serde_json::Value::Null => actual.is_null(),
        serde_json::Value::Bool(b) => matches!(actual, FieldValue::Boolean(a) if a == b),
        serde_json::Value::Number(n) => {
            !matches!(actual, FieldValue::Boolean(_))
                && matches!((actual.as_f64(), n.as_f64()), (Some(a), Some(e)) if a == e)
        }
        serde_json::Value::String(s) => match actual {
            FieldValue::Text(a) => a == s,
            FieldValue::Integer(_) | FieldValue::Float(_) => {
                s.trim().parse::<f64>().ok() == actual.as_f64()
            }
            FieldValue::Boolean(b) => s.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
            FieldValue::Null => false,
        },
        other => actual.as_str() == Some(other.to_string().as_str()),
    }
}

// ── Engine ──────────────────────────────────────────────────────────

pub struct RecommendationEngine;

impl RecommendationEngine {
    /// Evaluate `rules` against every item. Only items with at least one
    /// recommendation are returned, in input order.
    pub fn recommend(
        items: &[DiagnosticRecord],
        rules: &[RecommendationRule],
        max_per_item: usize,
    ) -> Vec<RecommendationSet> {
        let compiled: Vec<(&RecommendationRule, Vec<Condition>)> = rules
            .iter()
            .map(|rule| {
                let conditions = rule
                    .if_condition
                    .iter()
                    .map(|(k, v)| Condition::parse(k, v))
                    .collect();
                (rule, conditions)
            })
            .collect();

        items
            .iter()
            .filter_map(|item| {
                let recommendations = Self::recommend_one(item, &compiled, max_per_item);
                if recommendations.is_empty() {
                    None
                } else {
                    Some(RecommendationSet {
                        item: item.clone(),
                        recommendations,
                    })
                }
            })
            .collect()
    }

    fn recommend_one(
        item: &DiagnosticRecord,
        rules: &[(&RecommendationRule, Vec<Condition>)],
        max_per_item: usize,
    ) -> Vec<Recommendation> {
        let mut out = Vec::new();
        if max_per_item == 0 {
            return out;
        }

        for (rule, conditions) in rules {
            // An empty condition map is vacuous and never matches.
            if conditions.is_empty() {
                continue;
            }
            if !conditions.iter().all(|c| c.is_satisfied_by(item)) {
                continue;
            }

            debug!(rule = %rule.name, "recommendation rule matched");
            for rec in &rule.then_recommend {
                if out.len() >= max_per_item {
                    break;
                }
                out.push(rec.clone());
            }
            if out.len() >= max_per_item {
                break;
            }
        }

        out
    }
}
