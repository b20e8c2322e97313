//! `check_sandbox_status` tool: non-blocking poll of a sandbox's exit code.

use super::TOOL_STATUS;
use crate::sandbox::ControlPlane;
use crate::tools::traits::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct StatusArgs {
    sandbox_id: String,
}

pub struct CheckSandboxStatusTool {
    client: Arc<dyn ControlPlane>,
}

impl CheckSandboxStatusTool {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CheckSandboxStatusTool {
    fn name(&self) -> &str {
        TOOL_STATUS
    }

    fn description(&self) -> &str {
        "Check whether a sandbox is still running. Returns null while it runs and the exit \
         code of its main process once it has stopped."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sandbox_id": {
                    "type": "string",
                    "description": "Sandbox to check."
                }
            },
            "required": ["sandbox_id"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let args: StatusArgs = parse_args(TOOL_STATUS, args)?;

        match self.client.poll(&args.sandbox_id).await {
            Ok(exit_code) => Ok(ToolResult::json(&json!(exit_code))),
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to check sandbox {}: {e:#}",
                args.sandbox_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::fake::FakeControlPlane;
    use crate::sandbox::CreateSandboxRequest;

    #[tokio::test]
    async fn null_while_running_then_exit_code() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.add_image("im-1");
        let sandbox_id = fake
            .create(&CreateSandboxRequest {
                image_id: "im-1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let tool = CheckSandboxStatusTool::new(fake.clone());

        let running = tool
            .execute(json!({"sandbox_id": sandbox_id}))
            .await
            .unwrap();
        assert!(running.success);
        assert_eq!(running.output, "null");

        fake.terminate(&sandbox_id).await.unwrap();
        let stopped = tool
            .execute(json!({"sandbox_id": sandbox_id}))
            .await
            .unwrap();
        let code: Option<i32> = serde_json::from_str(&stopped.output).unwrap();
        assert!(code.is_some());
    }
}
