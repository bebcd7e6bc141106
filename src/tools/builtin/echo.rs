use std::time::Instant;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolOutput, require_str};

/// Returns its `message` parameter unchanged.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the given message. Useful for testing tool plumbing."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let message = require_str(self.name(), &params, "message")?;
        Ok(ToolOutput::text(message, start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_message() {
        let output = EchoTool
            .execute(serde_json::json!({"message": "hello"}))
            .await
            .unwrap();
        assert_eq!(output.result, serde_json::json!("hello"));
    }

    #[tokio::test]
    async fn missing_message_is_invalid() {
        let err = EchoTool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }
}
