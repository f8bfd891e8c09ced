//! Definition document loader.
//!
//! Reads JSON or YAML (chosen by file extension) definition documents. The
//! document is first parsed into an untyped value, then each section
//! (`patterns`, `rules`, `plans`) is deserialized on its own, so a
//! malformed section falls back to the built-in defaults without discarding
//! the sections that did parse. Nothing here is fatal: every failure is
//! logged and reported in the returned [`LoadResult`]s.

mod error;


pub use error::{DefinitionError, LoadResult, LoadStatus, Result};

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::defaults;
use crate::definition::{DefinitionSet, FeatureDefinition};
use crate::features::has_usable_feature;
use crate::lint::lint_definitions;

const PATTERN_KEYS: &[&str] = &["patterns", "Patterns"];
const RULE_KEYS: &[&str] = &["rules", "Rules", "recommendationRules", "RecommendationRules"];
const PLAN_KEYS: &[&str] = &["plans", "Plans", "actionMap", "ActionMap"];

/// Parse a document from disk into any deserializable type.
///
/// `.yml` / `.yaml` files are read as YAML, everything else as JSON.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)?;
    parse_document(&contents, is_yaml(path))
}

pub(crate) fn parse_document<T: DeserializeOwned>(contents: &str, yaml: bool) -> Result<T> {
    if contents.trim().is_empty() {
        return Err(DefinitionError::Invalid("document is empty".to_string()));
    }
    if yaml {
        Ok(serde_yaml::from_str(contents)?)
    } else {
        // Tolerate a UTF-8 byte order mark from Windows editors.
        Ok(serde_json::from_str(contents.trim_start_matches('\u{feff}'))?)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}

/// Load the definitions document at `path`, falling back to built-in
/// defaults per section. `None` uses the defaults outright.
pub fn load_definitions(path: Option<&Path>) -> (DefinitionSet, Vec<LoadResult>) {
    let Some(path) = path else {
        let results = ["patterns", "rules", "plans"]
            .into_iter()
            .map(|section| LoadResult {
                path: None,
                section,
                status: LoadStatus::Skipped {
                    reason: "no definitions document configured".to_string(),
                },
            })
            .collect();
        return (defaults::definition_set(), results);
    };

    let document: serde_json::Value = match read_document(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read definitions, using built-in defaults");
            let results = ["patterns", "rules", "plans"]
                .into_iter()
                .map(|section| LoadResult {
                    path: Some(path.to_path_buf()),
                    section,
                    status: LoadStatus::Failed { error: e.to_string() },
                })
                .collect();
            return (defaults::definition_set(), results);
        }
    };

    let (set, results) = definitions_from_value(&document, Some(path));
    let lint = lint_definitions(&set);
    for issue in &lint.errors {
        warn!(path = %issue.path, message = %issue.message, suggestion = ?issue.suggestion, "definition error");
    }
    for issue in &lint.warnings {
        warn!(path = %issue.path, message = %issue.message, "definition warning");
    }
    (set, results)
}

/// Split an already-parsed document into sections.
pub fn definitions_from_value(
    document: &serde_json::Value,
    path: Option<&Path>,
) -> (DefinitionSet, Vec<LoadResult>) {
    let mut results = Vec::with_capacity(3);

    let (patterns, r) = load_section(document, "patterns", PATTERN_KEYS, path, defaults::patterns, |v: &Vec<_>| v.len());
    results.push(r);
    let (rules, r) = load_section(document, "rules", RULE_KEYS, path, defaults::rules, |v: &Vec<_>| v.len());
    results.push(r);
    let (plans, r) = load_section(document, "plans", PLAN_KEYS, path, defaults::plans, |m: &indexmap::IndexMap<_, _>| m.len());
    results.push(r);

    (DefinitionSet { patterns, rules, plans }, results)
}

fn load_section<T, D, C>(
    document: &serde_json::Value,
    section: &'static str,
    keys: &[&str],
    path: Option<&Path>,
    default: D,
    count: C,
) -> (T, LoadResult)
where
    T: DeserializeOwned,
    D: FnOnce() -> T,
    C: FnOnce(&T) -> usize,
{
    let path_buf = path.map(Path::to_path_buf);
    let shown = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(inline)".to_string());

    let Some(raw) = keys.iter().find_map(|k| document.get(*k)) else {
        warn!(path = %shown, section, "section missing, using built-in defaults");
        return (
            default(),
            LoadResult {
                path: path_buf,
                section,
                status: LoadStatus::Skipped {
                    reason: "section missing".to_string(),
                },
            },
        );
    };

    match serde_json::from_value::<T>(raw.clone()) {
        Ok(value) => {
            let n = count(&value);
            info!(path = %shown, section, count = n, "loaded definitions");
            (
                value,
                LoadResult {
                    path: path_buf,
                    section,
                    status: LoadStatus::Loaded { count: n },
                },
            )
        }
        Err(e) => {
            warn!(path = %shown, section, error = %e, "malformed section, using built-in defaults");
            (
                default(),
                LoadResult {
                    path: path_buf,
                    section,
                    status: LoadStatus::Failed { error: e.to_string() },
                },
            )
        }
    }
}

/// Load a feature definition. Returns None (built-in features) when the
/// file cannot be read, is not an object, or declares no usable feature,
/// with a logged warning.
pub fn load_feature_definition(path: &Path) -> Option<FeatureDefinition> {
    let parsed = read_document::<serde_json::Value>(path).and_then(|document| {
        if !document.is_object() {
            return Err(DefinitionError::Invalid(
                "feature definition must be an object".to_string(),
            ));
        }
        Ok(serde_json::from_value::<FeatureDefinition>(document)?)
    });
    match parsed {
        Ok(def) if has_usable_feature(&def) => {
            info!(
                path = %path.display(),
                text = def.text_properties.len(),
                numeric = def.numerical_properties.len(),
                datetime = def.date_time_properties.len(),
                "loaded feature definition"
            );
            Some(def)
        }
        Ok(_) => {
            warn!(path = %path.display(), "feature definition declares no usable features, using built-in features");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read feature definition, using built-in features");
            None
        }
    }
}
