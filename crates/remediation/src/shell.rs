//! Remediation commands backed by scripts or executables.
//!
//! The program gets the [`CommandRequest`] as JSON on stdin, the action id as
//! `FLEETMEND_ACTION_ID` and each parameter as `FLEETMEND_PARAM_<NAME>`.
//! If stdout is a `{status, output, errors}` JSON document it is the result;
//! otherwise the exit code decides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use fleetmend_core::process::{self, ProcessError, ProcessSpec};

use crate::command::{CommandError, CommandOutcome, CommandRequest, RemediationCommand};

pub const ENV_ACTION_ID: &str = "FLEETMEND_ACTION_ID";
pub const ENV_PARAM_PREFIX: &str = "FLEETMEND_PARAM_";

pub struct ShellCommand {
    name: String,
    command_line: String,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl ShellCommand {
    /// A command given as a shell command line.
    pub fn new(name: impl Into<String>, command_line: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            command_line: command_line.into(),
            timeout,
            working_dir: None,
        }
    }

    /// A command backed by a program on disk. The program's directory is the
    /// working directory.
    pub fn from_program(name: impl Into<String>, program: &Path, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            command_line: shell_quote(&program.to_string_lossy()),
            timeout,
            working_dir: program.parent().map(Path::to_path_buf),
        }
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }
}

#[async_trait]
impl RemediationCommand for ShellCommand {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome, CommandError> {
        let body = serde_json::to_value(request)
            .map_err(|e| CommandError::InvalidInput(format!("request not serializable: {e}")))?;

        let mut spec = ProcessSpec::new(&self.command_line, self.timeout)
            .stdin_json(&body)
            .env(ENV_ACTION_ID, &request.action_id);
        for (key, value) in &request.resolved_parameters {
            spec = spec.env(param_env_name(key), param_env_value(value));
        }
        spec.working_dir = self.working_dir.clone();

        debug!(command = %self.name, action_id = %request.action_id, "running remediation command");
        let out = process::run(&spec).await.map_err(|e| match e {
            ProcessError::Timeout(d) => CommandError::Timeout(d),
            other => CommandError::ExecutionFailed(other.to_string()),
        })?;

        let reported = serde_json::from_str::<Value>(out.stdout.trim())
            .ok()
            .and_then(|v| CommandOutcome::from_json(&v));
        let outcome = match reported {
            Some(mut outcome) => {
                if !out.success {
                    outcome.success = false;
                    outcome
                        .errors
                        .push(format!("exit code {}", out.exit_code.unwrap_or(-1)));
                }
                outcome
            }
            None if out.success => CommandOutcome::success(out.combined()),
            None => {
                let mut errors: Vec<String> = out
                    .stderr
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect();
                if errors.is_empty() {
                    errors.push(format!("exit code {}", out.exit_code.unwrap_or(-1)));
                }
                CommandOutcome {
                    success: false,
                    output: out.stdout.trim_end().to_string(),
                    errors,
                }
            }
        };
        Ok(outcome)
    }
}

/// `ServiceName` → `FLEETMEND_PARAM_SERVICENAME`; other characters outside
/// `[A-Za-z0-9]` become `_`.
pub fn param_env_name(key: &str) -> String {
    let suffix: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{ENV_PARAM_PREFIX}{suffix}")
}

fn param_env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Scan `dir` for remediation programs. Each regular, non-hidden file
/// becomes a command named after its file stem (`flush-dns.sh` →
/// `flush-dns`). Later duplicates of a stem are ignored.
pub fn discover_commands(dir: &Path, timeout: Duration) -> Vec<ShellCommand> {
    let mut found: Vec<ShellCommand> = Vec::new();
    for entry in WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to read commands directory entry");
                None
            }
        })
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with('.') || stem.is_empty() {
            continue;
        }
        if found.iter().any(|c| c.name == stem) {
            warn!(path = %path.display(), name = stem, "duplicate command name, ignoring");
            continue;
        }
        found.push(ShellCommand::from_program(stem, path, timeout));
    }
    info!(dir = %dir.display(), count = found.len(), "discovered remediation commands");
    found
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;

    fn request(params: &[(&str, Value)]) -> CommandRequest {
        CommandRequest {
            action_id: "REM_SVC_RESTART".into(),
            resolved_parameters: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<IndexMap<_, _>>(),
        }
    }

    #[test]
    fn env_names() {
        assert_eq!(param_env_name("ServiceName"), "FLEETMEND_PARAM_SERVICENAME");
        assert_eq!(param_env_name("min-free %"), "FLEETMEND_PARAM_MIN_FREE__");
    }

    #[tokio::test]
    async fn parameters_arrive_as_env() {
        let cmd = ShellCommand::new(
            "echo",
            "printf '%s/%s' \"$FLEETMEND_ACTION_ID\" \"$FLEETMEND_PARAM_SERVICENAME\"",
            Duration::from_secs(5),
        );
        let outcome = cmd.run(&request(&[("ServiceName", json!("Spooler"))])).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, "REM_SVC_RESTART/Spooler");
    }

    #[tokio::test]
    async fn json_status_wins_over_plain_output() {
        let cmd = ShellCommand::new(
            "reporting",
            r#"cat >/dev/null; echo '{"status":"Failed","output":"checked","errors":["still stopped"]}'"#,
            Duration::from_secs(5),
        );
        let outcome = cmd.run(&request(&[])).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.output, "checked");
        assert_eq!(outcome.errors, vec!["still stopped".to_string()]);
    }

    #[tokio::test]
    async fn exit_code_decides_plain_output() {
        let cmd = ShellCommand::new("failing", "echo 'access denied' >&2; exit 5", Duration::from_secs(5));
        let outcome = cmd.run(&request(&[])).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.errors, vec!["access denied".to_string()]);

        let slow = ShellCommand::new("slow", "sleep 5", Duration::from_millis(100));
        assert!(matches!(slow.run(&request(&[])).await, Err(CommandError::Timeout(_))));
    }

    #[tokio::test]
    async fn discovers_and_runs_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("flush-dns.sh");
        std::fs::write(&script, "#!/bin/sh\necho flushed\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let commands = discover_commands(dir.path(), Duration::from_secs(5));
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name(), "flush-dns");

        let outcome = commands[0].run(&request(&[])).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, "flushed");
    }
}
