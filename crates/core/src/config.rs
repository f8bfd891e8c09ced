use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::action::ApprovalMode;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_list(profile: &str, key: &str) -> Vec<String> {
    profiled_env_opt(profile, key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub limits: LimitsConfig,
    pub definitions: DefinitionsConfig,
    pub execution: ExecutionConfig,
    pub model: ModelConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FLEETMEND_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FLEETMEND_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            limits: LimitsConfig::from_env_profiled(p),
            definitions: DefinitionsConfig::from_env_profiled(p),
            execution: ExecutionConfig::from_env_profiled(p),
            model: ModelConfig::from_env_profiled(p),
            telemetry: TelemetryConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  limits:      max_patterns={}, max_recommendations={}, high_confidence={}",
            self.limits.max_patterns,
            self.limits.max_recommendations_per_input,
            self.limits.high_confidence_threshold
        );
        tracing::info!(
            "  definitions: rules={}, features={}, validation={}",
            display_path(&self.definitions.definitions_path),
            display_path(&self.definitions.feature_definition_path),
            display_path(&self.definitions.validation_rules_path)
        );
        tracing::info!(
            "  execution:   mode={}, timeout={}s, commands_dir={}",
            self.execution.approval_mode,
            self.execution.command_timeout_secs,
            display_path(&self.execution.commands_dir)
        );
        tracing::info!(
            "  model:       name={}, configured={}",
            self.model.name,
            self.model.is_configured()
        );
        tracing::info!(
            "  telemetry:   server={}, configured={}",
            self.telemetry.server_name,
            self.telemetry.is_configured()
        );
    }

    /// Return a redacted view safe to print (no endpoint URLs or commands).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "limits": self.limits,
            "definitions": self.definitions,
            "execution": {
                "approval_mode": self.execution.approval_mode,
                "command_timeout_secs": self.execution.command_timeout_secs,
                "commands_dir": self.execution.commands_dir,
            },
            "model": {
                "name": self.model.name,
                "model_type": self.model.model_type,
                "class_labels": self.model.class_labels,
                "configured": self.model.is_configured(),
            },
            "telemetry": {
                "server_name": self.telemetry.server_name,
                "configured": self.telemetry.is_configured(),
            },
        })
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(built-in)".to_string())
}

// ── Limits ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_patterns: usize,
    pub max_recommendations_per_input: usize,
    /// Predictions at or above this confidence count as high-confidence.
    pub high_confidence_threshold: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_patterns: 10,
            max_recommendations_per_input: 3,
            high_confidence_threshold: 0.8,
        }
    }
}

impl LimitsConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            max_patterns: profiled_env_usize(p, "MAX_PATTERNS", defaults.max_patterns),
            max_recommendations_per_input: profiled_env_usize(
                p,
                "MAX_RECOMMENDATIONS_PER_INPUT",
                defaults.max_recommendations_per_input,
            ),
            high_confidence_threshold: profiled_env_opt(p, "HIGH_CONFIDENCE_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.high_confidence_threshold),
        }
    }
}

// ── Definition files ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionsConfig {
    /// Patterns, recommendation rules and plan overrides.
    pub definitions_path: Option<PathBuf>,
    pub feature_definition_path: Option<PathBuf>,
    pub validation_rules_path: Option<PathBuf>,
}

impl DefinitionsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            definitions_path: profiled_env_opt(p, "DEFINITIONS_PATH").map(PathBuf::from),
            feature_definition_path: profiled_env_opt(p, "FEATURE_DEFINITION_PATH")
                .map(PathBuf::from),
            validation_rules_path: profiled_env_opt(p, "VALIDATION_RULES_PATH")
                .map(PathBuf::from),
        }
    }
}

// ── Execution ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub approval_mode: ApprovalMode,
    pub command_timeout_secs: u64,
    /// Directory scanned for remediation scripts.
    pub commands_dir: Option<PathBuf>,
}

impl ExecutionConfig {
    fn from_env_profiled(p: &str) -> Self {
        let approval_mode = match profiled_env_opt(p, "APPROVAL_MODE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid APPROVAL_MODE, using Assisted");
                ApprovalMode::Assisted
            }),
            None => ApprovalMode::Assisted,
        };
        Self {
            approval_mode,
            command_timeout_secs: profiled_env_u64(p, "COMMAND_TIMEOUT_SECS", 300),
            commands_dir: profiled_env_opt(p, "COMMANDS_DIR").map(PathBuf::from),
        }
    }
}

// ── Predictive model ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Program invoked once per feature set.
    pub command: Option<String>,
    pub name: String,
    pub model_type: String,
    pub class_labels: Vec<String>,
    /// Explicit feature order; overrides every other ordering source.
    pub feature_order: Vec<String>,
    /// Probability index graded for risk.
    pub failure_class_index: usize,
    pub timeout_secs: u64,
}

impl ModelConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            command: profiled_env_opt(p, "MODEL_COMMAND"),
            name: profiled_env_or(p, "MODEL_NAME", "failure-predictor"),
            model_type: profiled_env_or(p, "MODEL_TYPE", "Classifier"),
            class_labels: profiled_env_list(p, "MODEL_CLASS_LABELS"),
            feature_order: profiled_env_list(p, "MODEL_FEATURE_ORDER"),
            failure_class_index: profiled_env_u64(p, "MODEL_FAILURE_CLASS_INDEX", 1) as usize,
            timeout_secs: profiled_env_u64(p, "MODEL_TIMEOUT_SECS", 60),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.command.is_some()
    }
}

// ── Telemetry ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub url: Option<String>,
    pub command: Option<String>,
    pub server_name: String,
    pub timeout_secs: u64,
}

impl TelemetryConfig {
    fn from_env_profiled(p: &str) -> Self {
        let fallback_host = env_opt("HOSTNAME")
            .or_else(|| env_opt("COMPUTERNAME"))
            .unwrap_or_else(|| "localhost".to_string());
        Self {
            url: profiled_env_opt(p, "TELEMETRY_URL"),
            command: profiled_env_opt(p, "TELEMETRY_COMMAND"),
            server_name: profiled_env_or(p, "SERVER_NAME", &fallback_host),
            timeout_secs: profiled_env_u64(p, "TELEMETRY_TIMEOUT_SECS", 30),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.command.is_some()
    }
}
