//! `wait_for_process` tool: block on a background process and collect its output.

use super::TOOL_WAIT;
use crate::processes::ProcessRegistry;
use crate::sandbox::ControlPlane;
use crate::tools::traits::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct WaitArgs {
    sandbox_id: String,
    process_id: u64,
}

pub struct WaitForProcessTool {
    client: Arc<dyn ControlPlane>,
    processes: Arc<ProcessRegistry>,
}

impl WaitForProcessTool {
    pub fn new(client: Arc<dyn ControlPlane>, processes: Arc<ProcessRegistry>) -> Self {
        Self { client, processes }
    }

    async fn collect(&self, args: &WaitArgs) -> anyhow::Result<serde_json::Value> {
        self.client.lookup(&args.sandbox_id).await?;

        // Taken before waiting: a failed wait still consumes the id.
        let process = self.processes.take(&args.sandbox_id, args.process_id)?;
        let output = self.client.wait(&process).await?;

        tracing::debug!(
            sandbox_id = %args.sandbox_id,
            process_id = args.process_id,
            exit_code = output.exit_code,
            "Background process collected"
        );
        Ok(json!([output.exit_code, output.stdout, output.stderr]))
    }
}

#[async_trait]
impl Tool for WaitForProcessTool {
    fn name(&self) -> &str {
        TOOL_WAIT
    }

    fn description(&self) -> &str {
        "Wait for a process started with exec_in_sandbox_background and return \
         [exit_code, stdout, stderr]. Each process id can be waited on only once."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sandbox_id": {
                    "type": "string",
                    "description": "Sandbox the process was started in."
                },
                "process_id": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Id returned by exec_in_sandbox_background."
                }
            },
            "required": ["sandbox_id", "process_id"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let args: WaitArgs = parse_args(TOOL_WAIT, args)?;

        match self.collect(&args).await {
            Ok(result) => Ok(ToolResult::json(&result)),
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to wait for process {}: {e:#}",
                args.process_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::fake::FakeControlPlane;
    use crate::sandbox::CreateSandboxRequest;
    use crate::tools::sandbox::ExecInSandboxBackgroundTool;

    struct Fixture {
        fake: Arc<FakeControlPlane>,
        sandbox_id: String,
        launch: ExecInSandboxBackgroundTool,
        wait: WaitForProcessTool,
    }

    async fn start_sandbox(fake: &FakeControlPlane) -> String {
        fake.create(&CreateSandboxRequest {
            image_id: "im-base".into(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    async fn fixture() -> Fixture {
        let fake = Arc::new(FakeControlPlane::new());
        fake.add_image("im-base");
        let sandbox_id = start_sandbox(&fake).await;
        let processes = Arc::new(ProcessRegistry::in_memory());

        Fixture {
            fake: fake.clone(),
            sandbox_id,
            launch: ExecInSandboxBackgroundTool::new(fake.clone(), processes.clone()),
            wait: WaitForProcessTool::new(fake, processes),
        }
    }

    async fn launch(fx: &Fixture, command: &[&str]) -> u64 {
        let result = fx
            .launch
            .execute(json!({"sandbox_id": fx.sandbox_id, "command": command}))
            .await
            .unwrap();
        assert!(result.success, "{:?}", result.error);
        serde_json::from_str(&result.output).unwrap()
    }

    async fn wait(fx: &Fixture, process_id: u64) -> ToolResult {
        fx.wait
            .execute(json!({"sandbox_id": fx.sandbox_id, "process_id": process_id}))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn launch_and_wait_scenario() {
        let fx = fixture().await;

        assert_eq!(launch(&fx, &["sleep", "1"]).await, 1);
        assert_eq!(launch(&fx, &["echo", "hi"]).await, 2);

        let second = wait(&fx, 2).await;
        assert!(second.success);
        let parsed: (i32, String, String) = serde_json::from_str(&second.output).unwrap();
        assert_eq!(parsed, (0, "hi\n".to_string(), String::new()));

        let again = wait(&fx, 2).await;
        assert!(!again.success);
        assert!(again.error.unwrap().contains("not found"));

        let first = wait(&fx, 1).await;
        let parsed: (i32, String, String) = serde_json::from_str(&first.output).unwrap();
        assert_eq!(parsed, (0, String::new(), String::new()));
    }

    #[tokio::test]
    async fn never_issued_id_is_not_found() {
        let fx = fixture().await;
        let result = wait(&fx, 7).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("process 7 not found"));
    }

    #[tokio::test]
    async fn ids_keep_increasing_after_waits() {
        let fx = fixture().await;
        let first = launch(&fx, &["true"]).await;
        wait(&fx, first).await;
        let second = launch(&fx, &["true"]).await;
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn wrong_sandbox_does_not_consume() {
        let fx = fixture().await;
        let id = launch(&fx, &["echo", "x"]).await;
        let other = start_sandbox(&fx.fake).await;
        assert_ne!(other, fx.sandbox_id);

        let result = fx
            .wait
            .execute(json!({"sandbox_id": other, "process_id": id}))
            .await
            .unwrap();
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(
            error.contains(&format!("was started in sandbox {}", fx.sandbox_id)),
            "{error}"
        );

        let collected = wait(&fx, id).await;
        assert!(collected.success, "{:?}", collected.error);
        let parsed: (i32, String, String) = serde_json::from_str(&collected.output).unwrap();
        assert_eq!(parsed.1, "x\n");
    }
}
