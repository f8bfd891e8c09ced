//! Keyword pattern matcher.
//!
//! Patterns are evaluated in definition order and scanning stops as soon as
//! `max_patterns` matches have been collected, so the position of a pattern
//! in the definition list decides whether it can be reported at all.

use tracing::{debug, warn};

use fleetmend_core::{DiagnosticRecord, PatternMatch, MAX_EXAMPLE_ITEMS};

use crate::definition::{PatternCondition, PatternDefinition};

pub struct PatternMatcher;

impl PatternMatcher {
    /// Match `patterns` against `records`, returning at most `max_patterns`
    /// results in definition order.
    pub fn match_patterns(
        records: &[DiagnosticRecord],
        patterns: &[PatternDefinition],
        max_patterns: usize,
    ) -> Vec<PatternMatch> {
        let mut matches = Vec::new();

        for pattern in patterns {
            if matches.len() >= max_patterns {
                debug!(max_patterns, "pattern cap reached, remaining patterns not evaluated");
                break;
            }

            if !pattern.is_keyword_match() {
                warn!(
                    pattern = %pattern.name,
                    pattern_type = %pattern.pattern_type,
                    "unsupported pattern type, skipping"
                );
                continue;
            }

            if pattern.conditions.is_empty() {
                warn!(pattern = %pattern.name, "pattern has no conditions, skipping");
                continue;
            }

            if let Some(m) = Self::evaluate(records, pattern) {
                debug!(pattern = %m.pattern_name, matched = m.matched_item_count, "pattern matched");
                matches.push(m);
            }
        }

        matches
    }

    /// All conditions must pass; matched items of every condition are
    /// concatenated without deduplication.
    fn evaluate(records: &[DiagnosticRecord], pattern: &PatternDefinition) -> Option<PatternMatch> {
        let mut matched: Vec<&DiagnosticRecord> = Vec::new();

        for condition in &pattern.conditions {
            let hits = Self::condition_hits(records, condition);
            if hits.len() < condition.min_occurrences {
                return None;
            }
            matched.extend(hits);
        }

        Some(PatternMatch {
            pattern_name: pattern.name.clone(),
            description: pattern.description.clone(),
            matched_item_count: matched.len(),
            example_items: matched
                .iter()
                .take(MAX_EXAMPLE_ITEMS)
                .map(|r| (*r).clone())
                .collect(),
        })
    }

    /// Records whose text property contains every keyword (case-sensitive).
    /// Missing and non-text properties are skipped.
    fn condition_hits<'a>(
        records: &'a [DiagnosticRecord],
        condition: &PatternCondition,
    ) -> Vec<&'a DiagnosticRecord> {
        records
            .iter()
            .filter(|record| {
                let Some(text) = record.get(&condition.property).and_then(|v| v.as_str()) else {
                    return false;
                };
                condition.keywords.iter().all(|kw| text.contains(kw.as_str()))
            })
            .collect()
    }
}
