//! External program invocation shared by the model, command and telemetry
//! collaborators.
//!
//! Commands run through `sh -c` with optional JSON on stdin, extra
//! environment variables and a hard timeout. The child is killed when the
//! timeout fires.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("process timed out after {0:?}")]
    Timeout(Duration),
}

/// What to run and how.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Shell command line.
    pub command: String,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            env: Vec::new(),
            stdin: None,
            working_dir: None,
            timeout,
        }
    }

    pub fn stdin_json(mut self, value: &serde_json::Value) -> Self {
        self.stdin = Some(value.to_string().into_bytes());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// stdout and stderr joined the way operators expect to read them.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        if stderr.is_empty() {
            stdout.to_string()
        } else if stdout.is_empty() {
            stderr.to_string()
        } else {
            format!("{stdout}\n--- stderr ---\n{stderr}")
        }
    }
}

/// Run a command to completion.
pub async fn run(spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
    debug!(
        command = %spec.command,
        timeout_secs = spec.timeout.as_secs(),
        "spawning process"
    );

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&spec.command)
        .stdin(if spec.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (k, v) in &spec.env {
        cmd.env(k, v);
    }
    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        command: spec.command.clone(),
        source,
    })?;

    if let (Some(mut pipe), Some(bytes)) = (child.stdin.take(), spec.stdin.clone()) {
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&bytes).await {
                debug!(error = %e, "child closed stdin early");
            }
        });
    }

    let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(command = %spec.command, timeout_secs = spec.timeout.as_secs(), "process timed out");
            return Err(ProcessError::Timeout(spec.timeout));
        }
    };

    let out = ProcessOutput {
        exit_code: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if !out.success {
        debug!(exit_code = ?out.exit_code, "process returned non-zero exit code");
    }
    Ok(out)
}
