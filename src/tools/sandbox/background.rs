//! `exec_in_sandbox_background` tool: start a command and hand back a local id.

use super::{command_schema, EXEC_USAGE, TOOL_EXEC_BACKGROUND};
use crate::processes::ProcessRegistry;
use crate::sandbox::ControlPlane;
use crate::tools::traits::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct BackgroundArgs {
    sandbox_id: String,
    command: Vec<String>,
}

pub struct ExecInSandboxBackgroundTool {
    client: Arc<dyn ControlPlane>,
    processes: Arc<ProcessRegistry>,
    description: String,
}

impl ExecInSandboxBackgroundTool {
    pub fn new(client: Arc<dyn ControlPlane>, processes: Arc<ProcessRegistry>) -> Self {
        let description = format!(
            "Start a command in a sandbox without waiting for it, e.g. a web server or a long \
             build. Use exec_in_sandbox for short commands.\n\n{EXEC_USAGE}\n\n\
             Returns a process id assigned by this server (not a Linux pid). Pass it to \
             wait_for_process to collect the exit code and output; each id can be waited on \
             once. No snapshot is taken."
        );
        Self {
            client,
            processes,
            description,
        }
    }

    async fn launch(&self, args: &BackgroundArgs) -> anyhow::Result<u64> {
        self.client.lookup(&args.sandbox_id).await?;
        let process = self.client.exec(&args.sandbox_id, &args.command).await?;
        let id = self.processes.register(process)?;
        tracing::info!(sandbox_id = %args.sandbox_id, process_id = id, "Background process started");
        Ok(id)
    }
}

#[async_trait]
impl Tool for ExecInSandboxBackgroundTool {
    fn name(&self) -> &str {
        TOOL_EXEC_BACKGROUND
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sandbox_id": {
                    "type": "string",
                    "description": "Sandbox to run the command in."
                },
                "command": command_schema()
            },
            "required": ["sandbox_id", "command"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let args: BackgroundArgs = parse_args(TOOL_EXEC_BACKGROUND, args)?;

        if args.command.is_empty() {
            return Ok(ToolResult::failure("command cannot be empty"));
        }

        match self.launch(&args).await {
            Ok(id) => Ok(ToolResult::json(&json!(id))),
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to start command in sandbox {}: {e:#}",
                args.sandbox_id
            ))),
        }
    }
}
