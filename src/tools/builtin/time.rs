use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolOutput};

/// Current UTC time.
pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str {
        "time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let now = Utc::now();
        Ok(ToolOutput::success(
            serde_json::json!({
                "utc": now.to_rfc3339(),
                "unix": now.timestamp(),
            }),
            start.elapsed(),
        ))
    }
}
