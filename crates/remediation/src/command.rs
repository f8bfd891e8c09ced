use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a remediation command receives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub action_id: String,
    pub resolved_parameters: IndexMap<String, Value>,
}

/// What a remediation command reports back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
    pub errors: Vec<String>,
}

impl CommandOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            errors: Vec::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            errors: vec![error.into()],
        }
    }

    /// Read a `{status, output, errors}` document. `status` may be a string
    /// (`Success`, `ok`, `passed`, ... case-insensitive) or a boolean.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let status = ["status", "Status"].iter().find_map(|k| obj.get(*k))?;
        let success = match status {
            Value::Bool(b) => *b,
            Value::String(s) => matches!(
                s.to_ascii_lowercase().as_str(),
                "success" | "succeeded" | "ok" | "passed" | "pass"
            ),
            _ => false,
        };
        let output = ["output", "Output"]
            .iter()
            .find_map(|k| obj.get(*k))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let errors = match ["errors", "Errors"].iter().find_map(|k| obj.get(*k)) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        };
        Some(Self { success, output, errors })
    }
}

/// A named, parameterized remediation action.
///
/// Commands are object-safe, Send + Sync, and async.
#[async_trait]
pub trait RemediationCommand: Send + Sync {
    /// Registry key, matched against a plan's target reference.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome, CommandError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Command '{0}' is not registered")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_status_forms() {
        let ok = CommandOutcome::from_json(&json!({"status": "Success", "output": "done"})).unwrap();
        assert!(ok.success);
        assert_eq!(ok.output, "done");

        let bool_ok = CommandOutcome::from_json(&json!({"Status": true})).unwrap();
        assert!(bool_ok.success);

        let failed =
            CommandOutcome::from_json(&json!({"status": "Failed", "errors": ["disk busy"]})).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.errors, vec!["disk busy".to_string()]);
    }

    #[test]
    fn documents_without_status_are_not_outcomes() {
        assert!(CommandOutcome::from_json(&json!({"output": "x"})).is_none());
        assert!(CommandOutcome::from_json(&json!(["x"])).is_none());
    }

    #[test]
    fn request_serializes_camel_case() {
        let req = CommandRequest {
            action_id: "REM_SVC_RESTART".into(),
            resolved_parameters: [("ServiceName".to_string(), json!("Spooler"))].into_iter().collect(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"actionId": "REM_SVC_RESTART", "resolvedParameters": {"ServiceName": "Spooler"}})
        );
    }
}
