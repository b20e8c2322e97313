//! `get_current_time` tool: report the server's wall-clock time.

use super::traits::{Tool, ToolResult};
use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use serde_json::json;

const TOOL_NAME: &str = "get_current_time";

pub struct GetCurrentTimeTool;

impl GetCurrentTimeTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GetCurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetCurrentTimeTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Return the current local date and time as an RFC 3339 timestamp."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        Ok(ToolResult::json(&json!(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_parseable_timestamp() {
        let result = GetCurrentTimeTool::new().execute(json!({})).await.unwrap();
        assert!(result.success);

        let raw: String = serde_json::from_str(&result.output).unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(&raw).unwrap();
        let drift = (chrono::Utc::now() - parsed.with_timezone(&chrono::Utc))
            .num_seconds()
            .abs();
        assert!(drift < 5);
    }
}
