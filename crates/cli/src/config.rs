use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::debug;

use fleetmend_core::ApprovalMode;

/// CLI configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Approval mode when `--mode` is not given. Overrides `APPROVAL_MODE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<ApprovalMode>,

    /// Remediation commands by target reference (target -> program path).
    /// Take precedence over programs found in the commands directory.
    #[serde(default)]
    pub commands: BTreeMap<String, PathBuf>,

    /// Extra headers for the telemetry webhook. Values may use `${ENV_VAR}`.
    #[serde(default)]
    pub telemetry_headers: HashMap<String, String>,
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/fleetmend/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("fleetmend");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Returns default config if the file does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
            Ok(config)
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            let config = Self::default();
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let toml_str = toml::to_string_pretty(&config)
                .context("failed to serialize default config")?;
            std::fs::write(&config_path, toml_str).ok();
            Ok(config)
        }
    }

    /// Priority: cli_override > config file > environment.
    pub fn resolve_mode(&self, cli_override: Option<ApprovalMode>, from_env: ApprovalMode) -> ApprovalMode {
        cli_override.or(self.default_mode).unwrap_or(from_env)
    }
}
