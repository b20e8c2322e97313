//! `terminate_sandbox` tool: stop a sandbox and release it.

use super::TOOL_TERMINATE;
use crate::sandbox::ControlPlane;
use crate::tools::traits::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct TerminateArgs {
    sandbox_id: String,
}

pub struct TerminateSandboxTool {
    client: Arc<dyn ControlPlane>,
}

impl TerminateSandboxTool {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for TerminateSandboxTool {
    fn name(&self) -> &str {
        TOOL_TERMINATE
    }

    fn description(&self) -> &str {
        "Terminate a sandbox. Anything not captured in a snapshot is lost."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sandbox_id": {
                    "type": "string",
                    "description": "Sandbox to terminate."
                }
            },
            "required": ["sandbox_id"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let args: TerminateArgs = parse_args(TOOL_TERMINATE, args)?;

        match self.client.terminate(&args.sandbox_id).await {
            Ok(()) => {
                tracing::info!(sandbox_id = %args.sandbox_id, "Sandbox terminated");
                Ok(ToolResult {
                    success: true,
                    output: String::new(),
                    error: None,
                })
            }
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to terminate sandbox {}: {e:#}",
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
    async fn terminates_and_returns_nothing() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.add_image("im-1");
        let sandbox_id = fake
            .create(&CreateSandboxRequest {
                image_id: "im-1".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let result = TerminateSandboxTool::new(fake.clone())
            .execute(json!({"sandbox_id": sandbox_id}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.is_empty());
        assert!(fake.poll(&sandbox_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_sandbox_fails() {
        let fake = Arc::new(FakeControlPlane::new());
        let result = TerminateSandboxTool::new(fake)
            .execute(json!({"sandbox_id": "sb-ghost"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("sb-ghost"));
    }
}
