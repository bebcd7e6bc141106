//! Tool trait and the invocation/result types the planner works with.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ToolError;

/// Default upper bound on a single tool call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Output of a successful tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub result: serde_json::Value,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }

    pub fn text(text: impl Into<String>, duration: Duration) -> Self {
        Self::success(serde_json::Value::String(text.into()), duration)
    }
}

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the parameters object.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError>;

    fn execution_timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }
}

/// One tool call requested by an agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// Per-invocation outcome reported back to the caller.
///
/// Failures are values here, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub invocation_id: String,
    pub tool_name: String,
    pub success: bool,
    pub output: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration: Duration,
}

impl ToolResult {
    pub fn from_outcome(
        invocation: &ToolInvocation,
        outcome: Result<ToolOutput, ToolError>,
        elapsed: Duration,
    ) -> Self {
        match outcome {
            Ok(output) => Self {
                invocation_id: invocation.id.clone(),
                tool_name: invocation.name.clone(),
                success: true,
                output: output.result,
                error: None,
                duration: elapsed,
            },
            Err(e) => Self::failure(invocation, e.to_string(), elapsed),
        }
    }

    pub fn failure(invocation: &ToolInvocation, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            duration: elapsed,
        }
    }
}

/// Single-call executor the batch planner dispatches to.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Extract a required string parameter.
pub fn require_str<'a>(
    tool: &str,
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters {
            name: tool.to_string(),
            reason: format!("missing '{key}' parameter"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_result_carries_error() {
        let invocation = ToolInvocation::new("read_file", serde_json::json!({"path": "x"}));
        let result = ToolResult::from_outcome(
            &invocation,
            Err(ToolError::NotFound {
                name: "read_file".to_string(),
            }),
            Duration::from_millis(3),
        );
        assert!(!result.success);
        assert_eq!(result.invocation_id, invocation.id);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn require_str_reports_missing_key() {
        let params = serde_json::json!({"message": "hi"});
        assert_eq!(require_str("echo", &params, "message").unwrap(), "hi");
        assert!(matches!(
            require_str("echo", &params, "other"),
            Err(ToolError::InvalidParameters { .. })
        ));
    }
}
