//! Record → feature set conversion.
//!
//! Produces one [`FeatureSet`] per record. Feature names are built from the
//! source property and are stable across runs:
//!
//! | Kind            | Name                                         |
//! |-----------------|----------------------------------------------|
//! | keyword count   | `Feature_<Property>_Keyword_<Keyword>_Count` |
//! | numeric         | `Feature_<Property>`                         |
//! | day of week     | `Feature_<Property>_DayOfWeek` (Sunday = 0)  |
//! | hour of day     | `Feature_<Property>_HourOfDay`               |

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};
use tracing::{debug, warn};

use fleetmend_core::{DiagnosticRecord, FeatureSet, FieldValue};

use crate::definition::{DateTimeComponent, FeatureDefinition};

/// Text property scanned by the built-in feature set.
pub const DEFAULT_TEXT_PROPERTY: &str = "Message";

/// Keywords counted in [`DEFAULT_TEXT_PROPERTY`] when no definition is given.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "error",
    "failed",
    "timeout",
    "denied",
    "unreachable",
    "terminated",
    "exception",
    "warning",
];

/// Numeric properties passed through when no definition is given.
pub const DEFAULT_NUMERIC_PROPERTIES: &[&str] = &[
    "CpuUsage",
    "MemoryUsage",
    "DiskUsage",
    "NetworkLatency",
    "ErrorCount",
    "WarningCount",
    "ServiceRestarts",
    "ConnectionDrops",
];

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("no diagnostic records to extract features from")]
    NoRecords,

    #[error("feature definition declares no usable features")]
    EmptyDefinition,
}

pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Extract one feature set per record. `None` uses the built-in features.
    pub fn extract(
        records: &[DiagnosticRecord],
        definition: Option<&FeatureDefinition>,
    ) -> Result<Vec<FeatureSet>, FeatureError> {
        if records.is_empty() {
            return Err(FeatureError::NoRecords);
        }

        let owned_default;
        let definition = match definition {
            Some(def) => {
                log_ignored_declarations(def);
                if !has_usable_feature(def) {
                    return Err(FeatureError::EmptyDefinition);
                }
                def
            }
            None => {
                owned_default = default_definition();
                &owned_default
            }
        };

        let sets: Vec<FeatureSet> = records
            .iter()
            .map(|record| extract_record(record, definition))
            .collect();

        debug!(records = records.len(), "feature extraction complete");
        Ok(sets)
    }
}

/// The built-in definition expressed as a [`FeatureDefinition`].
pub fn default_definition() -> FeatureDefinition {
    use crate::definition::{NumericFeature, TextFeature, VECTORIZATION_KEYWORD_COUNT};

    FeatureDefinition {
        text_properties: vec![TextFeature {
            property: DEFAULT_TEXT_PROPERTY.to_string(),
            vectorization: VECTORIZATION_KEYWORD_COUNT.to_string(),
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }],
        numerical_properties: DEFAULT_NUMERIC_PROPERTIES
            .iter()
            .map(|p| NumericFeature {
                property: p.to_string(),
                normalization: None,
            })
            .collect(),
        date_time_properties: Vec::new(),
    }
}

pub(crate) fn has_usable_feature(def: &FeatureDefinition) -> bool {
    def.text_properties
        .iter()
        .any(|t| t.is_keyword_count() && !t.keywords.is_empty())
        || !def.numerical_properties.is_empty()
        || def.date_time_properties.iter().any(|d| !d.extract.is_empty())
}

/// Keywords of one property whose feature names coincide with an earlier
/// keyword's, as `(earlier, later)`. Only the earlier one is counted.
pub(crate) fn colliding_keywords(def: &FeatureDefinition) -> Vec<(String, String)> {
    let mut collisions = Vec::new();
    for text in def.text_properties.iter().filter(|t| t.is_keyword_count()) {
        let mut seen: Vec<(String, &str)> = Vec::with_capacity(text.keywords.len());
        for keyword in &text.keywords {
            let name = keyword_feature_name(&text.property, keyword);
            match seen.iter().find(|(n, _)| *n == name) {
                Some((_, earlier)) => collisions.push((earlier.to_string(), keyword.clone())),
                None => seen.push((name, keyword.as_str())),
            }
        }
    }
    collisions
}

fn log_ignored_declarations(def: &FeatureDefinition) {
    for (kept, dropped) in colliding_keywords(def) {
        warn!(kept = %kept, dropped = %dropped, "keywords share a feature name, counting only the first");
    }
    for text in def.text_properties.iter().filter(|t| !t.is_keyword_count()) {
        warn!(
            property = %text.property,
            vectorization = %text.vectorization,
            "unsupported text vectorization, ignoring"
        );
    }
    for numeric in &def.numerical_properties {
        if let Some(kind) = &numeric.normalization {
            debug!(
                property = %numeric.property,
                normalization = %kind,
                "normalization declared but not applied, passing raw value"
            );
        }
    }
}

fn extract_record(record: &DiagnosticRecord, def: &FeatureDefinition) -> FeatureSet {
    let mut features = FeatureSet::new();

    for text in def.text_properties.iter().filter(|t| t.is_keyword_count()) {
        let Some(value) = record.get(&text.property).and_then(FieldValue::as_str) else {
            continue;
        };
        let haystack = value.to_lowercase();
        for keyword in &text.keywords {
            let name = keyword_feature_name(&text.property, keyword);
            if features.contains_key(&name) {
                continue;
            }
            let needle = keyword.to_lowercase();
            let count = if needle.is_empty() {
                0
            } else {
                haystack.matches(needle.as_str()).count()
            };
            features.insert(name, count as i64);
        }
    }

    for numeric in &def.numerical_properties {
        let Some(value) = record.get(&numeric.property).and_then(FieldValue::as_f64) else {
            continue;
        };
        features.insert(format!("Feature_{}", numeric.property), value);
    }

    for dt in &def.date_time_properties {
        let Some(timestamp) = record.get(&dt.property).and_then(parse_timestamp) else {
            continue;
        };
        for component in &dt.extract {
            match component {
                DateTimeComponent::DayOfWeek => features.insert(
                    format!("Feature_{}_DayOfWeek", dt.property),
                    i64::from(timestamp.weekday().num_days_from_sunday()),
                ),
                DateTimeComponent::HourOfDay => features.insert(
                    format!("Feature_{}_HourOfDay", dt.property),
                    i64::from(timestamp.hour()),
                ),
            }
        }
    }

    features
}

/// Keyword feature name. Whitespace in the keyword becomes `_`.
pub fn keyword_feature_name(property: &str, keyword: &str) -> String {
    let keyword: String = keyword
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("Feature_{property}_Keyword_{keyword}_Count")
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Parse a timestamp in the offset it was recorded with. Accepts RFC 3339,
/// common naive layouts (taken as UTC), `/Date(<millis>)/` and epoch
/// seconds or milliseconds.
fn parse_timestamp(value: &FieldValue) -> Option<DateTime<FixedOffset>> {
    let utc = FixedOffset::east_opt(0)?;
    match value {
        FieldValue::Integer(n) => epoch_to_datetime(*n).map(|d| d.with_timezone(&utc)),
        FieldValue::Text(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt);
            }
            if let Some(millis) = s
                .strip_prefix("/Date(")
                .and_then(|rest| rest.strip_suffix(")/"))
            {
                let digits: String = millis
                    .chars()
                    .take_while(|c| c.is_ascii_digit() || *c == '-')
                    .collect();
                return digits
                    .parse::<i64>()
                    .ok()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .map(|d| d.with_timezone(&utc));
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| utc.from_utc_datetime(&naive))
        }
        _ => None,
    }
}

fn epoch_to_datetime(n: i64) -> Option<DateTime<Utc>> {
    if n.abs() >= 100_000_000_000 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}
