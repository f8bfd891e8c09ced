//! Built-in definitions used when no definitions document is configured or
//! a section of it cannot be read.

use indexmap::IndexMap;
use serde_json::json;

use fleetmend_core::{ImplementationType, Recommendation, Severity};

use crate::definition::{
    DefinitionSet, PatternCondition, PatternDefinition, PlanTemplate, RecommendationRule,
    KEYWORD_MATCH,
};

pub fn definition_set() -> DefinitionSet {
    DefinitionSet {
        patterns: patterns(),
        rules: rules(),
        plans: plans(),
    }
}

// ── Patterns ────────────────────────────────────────────────────────

fn keyword_pattern(name: &str, description: &str, keywords: &[&str]) -> PatternDefinition {
    PatternDefinition {
        name: name.to_string(),
        description: description.to_string(),
        pattern_type: KEYWORD_MATCH.to_string(),
        conditions: vec![PatternCondition {
            property: "Message".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            min_occurrences: 1,
        }],
    }
}

/// Built-in patterns, in evaluation order.
pub fn patterns() -> Vec<PatternDefinition> {
    vec![
        keyword_pattern(
            "ServiceTerminatedUnexpectedly",
            "A service process terminated unexpectedly",
            &["terminated unexpectedly"],
        ),
        keyword_pattern(
            "NetworkConnectionFailure",
            "Outbound network connections are failing",
            &["connection", "failed"],
        ),
        keyword_pattern(
            "CertificateExpired",
            "A certificate used by the host has expired",
            &["certificate", "expired"],
        ),
        keyword_pattern(
            "DiskSpaceLow",
            "A volume is running out of free space",
            &["low disk space"],
        ),
        keyword_pattern(
            "AuthenticationFailure",
            "Repeated authentication failures",
            &["authentication", "failed"],
        ),
        keyword_pattern(
            "AgentHeartbeatMissing",
            "The management agent stopped reporting",
            &["heartbeat", "missed"],
        ),
    ]
}

// ── Recommendation rules ────────────────────────────────────────────

fn recommendation(id: &str, title: &str, description: &str, severity: Severity, confidence: f64) -> Recommendation {
    Recommendation {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        severity,
        confidence: Some(confidence),
    }
}

fn rule(name: &str, condition: serde_json::Value, then: Vec<Recommendation>) -> RecommendationRule {
    let if_condition = match condition {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => IndexMap::new(),
    };
    RecommendationRule {
        name: name.to_string(),
        if_condition,
        then_recommend: then,
    }
}

/// Built-in recommendation rules, in evaluation order.
pub fn rules() -> Vec<RecommendationRule> {
    vec![
        rule(
            "network-connection-failure",
            json!({ "PatternName": "NetworkConnectionFailure" }),
            vec![
                recommendation(
                    "REC_NET_DNS",
                    "Flush the DNS resolver cache",
                    "Stale name resolution is the most common cause of failing outbound connections.",
                    Severity::Medium,
                    0.7,
                ),
                recommendation(
                    "REC_NET_ADAPTER",
                    "Reset the primary network adapter",
                    "Restart the adapter to clear a wedged driver or lease.",
                    Severity::High,
                    0.5,
                ),
                recommendation(
                    "REC_NET_FIREWALL",
                    "Review outbound firewall rules",
                    "Confirm that recent policy changes did not block required endpoints.",
                    Severity::Medium,
                    0.4,
                ),
            ],
        ),
        rule(
            "service-terminated",
            json!({ "PatternName": "ServiceTerminatedUnexpectedly" }),
            vec![
                recommendation(
                    "REC_SVC_RESTART",
                    "Restart the terminated service",
                    "Bring the service back and confirm it stays running.",
                    Severity::High,
                    0.8,
                ),
                recommendation(
                    "REC_SVC_RECOVERY",
                    "Configure service recovery actions",
                    "Set restart-on-failure so the service recovers without intervention.",
                    Severity::Low,
                    0.5,
                ),
            ],
        ),
        rule(
            "certificate-expired",
            json!({ "PatternName": "CertificateExpired" }),
            vec![recommendation(
                "REC_CERT_RENEW",
                "Renew the expired certificate",
                "Request a replacement certificate and rebind dependent services.",
                Severity::Critical,
                0.9,
            )],
        ),
        rule(
            "disk-space-low",
            json!({ "PatternName": "DiskSpaceLow" }),
            vec![recommendation(
                "REC_DISK_CLEANUP",
                "Clean up temporary files and logs",
                "Remove temp files, rotated logs and component store leftovers.",
                Severity::High,
                0.8,
            )],
        ),
        rule(
            "authentication-failure",
            json!({ "PatternName": "AuthenticationFailure" }),
            vec![recommendation(
                "REC_AUTH_REVIEW",
                "Review failing service account credentials",
                "Check for expired passwords or locked accounts used by services.",
                Severity::High,
                0.6,
            )],
        ),
        rule(
            "agent-heartbeat-missing",
            json!({ "PatternName": "AgentHeartbeatMissing" }),
            vec![recommendation(
                "REC_AGENT_RESTART",
                "Restart the management agent",
                "Restart the agent service and confirm it reports a heartbeat.",
                Severity::Medium,
                0.7,
            )],
        ),
        rule(
            "predicted-critical",
            json!({ "RiskLevel": "Critical" }),
            vec![recommendation(
                "REC_PRED_ESCALATE",
                "Escalate predicted failure",
                "The failure model rates this host as critical; schedule an operator review.",
                Severity::Critical,
                0.75,
            )],
        ),
        rule(
            "disk-usage-high",
            json!({ "Feature_DiskUsage": { "operator": "GreaterThan", "value": 90 } }),
            vec![recommendation(
                "REC_DISK_CLEANUP",
                "Clean up temporary files and logs",
                "Disk usage is above 90%.",
                Severity::High,
                0.7,
            )],
        ),
    ]
}

// ── Plan templates ──────────────────────────────────────────────────

struct PlanSpec<'a> {
    action_id: &'a str,
    title: &'a str,
    description: &'a str,
    target: Option<&'a str>,
    parameters: serde_json::Value,
    confirmation_required: bool,
    impact: &'a str,
    success_criteria: &'a str,
}

impl PlanSpec<'_> {
    fn build(self) -> PlanTemplate {
        let parameters = match self.parameters {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => IndexMap::new(),
        };
        PlanTemplate {
            action_id: self.action_id.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            implementation_type: if self.target.is_some() {
                ImplementationType::Scripted
            } else {
                ImplementationType::Manual
            },
            target_reference: self.target.map(str::to_string),
            parameters,
            confirmation_required: self.confirmation_required,
            impact: self.impact.to_string(),
            success_criteria: self.success_criteria.to_string(),
        }
    }
}

/// Built-in plan table keyed by recommendation id or pattern name.
pub fn plans() -> IndexMap<String, PlanTemplate> {
    let flush_dns = PlanSpec {
        action_id: "REM_NET_FLUSH_DNS",
        title: "Flush DNS resolver cache",
        description: "Clear the resolver cache and re-register DNS records.",
        target: Some("flush-dns"),
        parameters: json!({}),
        confirmation_required: false,
        impact: "None; cached lookups are repopulated on demand.",
        success_criteria: "Name resolution for configured endpoints succeeds.",
    }
    .build();

    let restart_service = PlanSpec {
        action_id: "REM_SVC_RESTART",
        title: "Restart service",
        description: "Restart the service reported as terminated.",
        target: Some("restart-service"),
        parameters: json!({ "ServiceName": "${ServiceName}" }),
        confirmation_required: true,
        impact: "The service is unavailable while it restarts.",
        success_criteria: "Service reports Running for at least one minute.",
    }
    .build();

    let cleanup_disk = PlanSpec {
        action_id: "REM_DISK_CLEANUP",
        title: "Disk cleanup",
        description: "Remove temporary files and rotated logs.",
        target: Some("cleanup-disk"),
        parameters: json!({ "Drive": "${Drive}", "MinFreePercent": 15 }),
        confirmation_required: true,
        impact: "Deleted temporary files cannot be recovered.",
        success_criteria: "Free space on the drive is above the threshold.",
    }
    .build();

    let renew_cert = PlanSpec {
        action_id: "REM_CERT_RENEW",
        title: "Renew certificate",
        description: "Request a replacement certificate and rebind it.",
        target: Some("renew-certificate"),
        parameters: json!({ "Thumbprint": "${Thumbprint}" }),
        confirmation_required: true,
        impact: "Dependent services restart to pick up the new binding.",
        success_criteria: "The bound certificate is valid for more than 30 days.",
    }
    .build();

    let restart_agent = PlanSpec {
        action_id: "REM_AGENT_RESTART",
        title: "Restart management agent",
        description: "Restart the agent service.",
        target: Some("restart-agent"),
        parameters: json!({}),
        confirmation_required: false,
        impact: "Telemetry from the host pauses briefly.",
        success_criteria: "The agent reports a heartbeat.",
    }
    .build();

    let reset_adapter = PlanSpec {
        action_id: "REM_NET_RESET_ADAPTER",
        title: "Reset network adapter",
        description: "Disable and re-enable the primary network adapter.",
        target: Some("reset-network-adapter"),
        parameters: json!({ "Adapter": "${Adapter}" }),
        confirmation_required: true,
        impact: "The host drops off the network for several seconds.",
        success_criteria: "The adapter reports Up and the gateway answers.",
    }
    .build();

    let firewall_review = PlanSpec {
        action_id: "REM_NET_FIREWALL_REVIEW",
        title: "Review firewall rules",
        description: "Compare outbound rules against the approved baseline.",
        target: None,
        parameters: json!({}),
        confirmation_required: true,
        impact: "None until changes are made.",
        success_criteria: "Required endpoints are reachable.",
    }
    .build();

    let mut table = IndexMap::new();
    table.insert("REC_NET_DNS".to_string(), flush_dns.clone());
    table.insert("REC_NET_ADAPTER".to_string(), reset_adapter);
    table.insert("REC_NET_FIREWALL".to_string(), firewall_review);
    table.insert("REC_SVC_RESTART".to_string(), restart_service.clone());
    table.insert("REC_DISK_CLEANUP".to_string(), cleanup_disk.clone());
    table.insert("REC_CERT_RENEW".to_string(), renew_cert.clone());
    table.insert("REC_AGENT_RESTART".to_string(), restart_agent.clone());

    // Pattern names, used when patterns matched but no rule recommended anything.
    table.insert("ServiceTerminatedUnexpectedly".to_string(), restart_service);
    table.insert("NetworkConnectionFailure".to_string(), flush_dns);
    table.insert("DiskSpaceLow".to_string(), cleanup_disk);
    table.insert("CertificateExpired".to_string(), renew_cert);
    table.insert("AgentHeartbeatMissing".to_string(), restart_agent);
    table
}
