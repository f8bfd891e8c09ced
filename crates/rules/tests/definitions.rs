//! Integration tests that load the sample documents under `data/` and run
//! them through the matcher, extractor and recommendation engine.

use std::path::PathBuf;

use fleetmend_core::{parse_records, DiagnosticRecord, FieldValue};
use fleetmend_rules::lint::lint_definitions;
use fleetmend_rules::loader::{load_definitions, load_feature_definition, LoadStatus};
use fleetmend_rules::{FeatureExtractor, PatternMatcher, RecommendationEngine};

fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

const SNAPSHOT: &str = r#"[
  { "Message": "The Print Spooler service terminated unexpectedly (error 7031).", "ServiceName": "Spooler",
    "TimeCreated": "2024-05-06T09:30:00Z", "ErrorCount": 14, "CpuUsage": 35.0 },
  { "Message": "connection to 10.0.0.5 failed: error 10060", "TimeCreated": "2024-05-06T09:31:00Z" },
  { "Message": "connection to 10.0.0.7 failed", "ErrorCount": 2 },
  { "Message": "heartbeat ok", "ErrorCount": 0 }
]"#;

#[test]
fn sample_definitions_load_cleanly() {
    let path = data_path("definitions.json");
    let (set, results) = load_definitions(Some(&path));

    for r in &results {
        assert!(
            matches!(r.status, LoadStatus::Loaded { .. }),
            "section {} did not load: {:?}",
            r.section,
            r.status
        );
    }
    let lint = lint_definitions(&set);
    assert!(lint.valid, "{:?}", lint.errors);
    assert_eq!(set.patterns.len(), 3);
}

#[test]
fn snapshot_flows_through_patterns_and_rules() {
    let (set, _) = load_definitions(Some(&data_path("definitions.json")));
    let records = parse_records(SNAPSHOT).unwrap();

    let matches = PatternMatcher::match_patterns(&records, &set.patterns, 10);
    let names: Vec<_> = matches.iter().map(|m| m.pattern_name.as_str()).collect();
    assert_eq!(names, ["ServiceTerminatedUnexpectedly", "NetworkConnectionFailure"]);
    assert_eq!(matches[1].matched_item_count, 2);

    let items: Vec<DiagnosticRecord> = matches
        .iter()
        .map(|m| {
            DiagnosticRecord::new()
                .with("PatternName", m.pattern_name.as_str())
                .with("MatchedItemCount", m.matched_item_count as i64)
        })
        .collect();
    let recs = RecommendationEngine::recommend(&items, &set.rules, 3);
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[1].recommendations.len(), 3);
}

#[test]
fn sample_feature_definition_drives_extraction() {
    let def = load_feature_definition(&data_path("features.yaml")).expect("features.yaml parses");
    let records = parse_records(SNAPSHOT).unwrap();
    let sets = FeatureExtractor::extract(&records, Some(&def)).unwrap();

    assert_eq!(sets.len(), records.len());
    let first = &sets[0];
    assert_eq!(
        first.get("Feature_Message_Keyword_terminated_Count"),
        Some(&FieldValue::Integer(1))
    );
    assert_eq!(first.get("Feature_ErrorCount"), Some(&FieldValue::Float(14.0)));
    // 2024-05-06 was a Monday.
    assert_eq!(first.get("Feature_TimeCreated_DayOfWeek"), Some(&FieldValue::Integer(1)));
    assert_eq!(first.get("Feature_TimeCreated_HourOfDay"), Some(&FieldValue::Integer(9)));

    let (set, _) = load_definitions(Some(&data_path("definitions.json")));
    let recs = RecommendationEngine::recommend(&sets, &set.rules, 3);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].recommendations[0].id, "REC_ERROR_TRIAGE");
}
