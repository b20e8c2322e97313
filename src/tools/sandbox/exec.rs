//! `exec_in_sandbox` tool: run a command to completion, then optionally
//! snapshot the filesystem.

use super::{command_schema, EXEC_USAGE, TOOL_EXEC};
use crate::sandbox::ControlPlane;
use crate::tools::traits::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

fn default_save_image() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ExecArgs {
    sandbox_id: String,
    command: Vec<String>,
    #[serde(default = "default_save_image")]
    save_image_after_exec: bool,
}

pub struct ExecInSandboxTool {
    client: Arc<dyn ControlPlane>,
    description: String,
}

impl ExecInSandboxTool {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        let description = format!(
            "Run a command in a sandbox and wait for it to finish. Returns \
             [exit_code, stdout, stderr, image_id].\n\n{EXEC_USAGE}\n\n\
             The call blocks until the command exits; for servers or other long-running work \
             use exec_in_sandbox_background instead.\n\n\
             With save_image_after_exec (default true) the sandbox filesystem is snapshotted \
             after the command and image_id identifies that snapshot: pass it to \
             restore_sandbox to get this exact state back after the sandbox has stopped, \
             without reinstalling anything. Set it to false for commands that do not change \
             the filesystem; image_id is then null."
        );
        Self {
            client,
            description,
        }
    }

    async fn run(&self, args: &ExecArgs) -> anyhow::Result<serde_json::Value> {
        self.client.lookup(&args.sandbox_id).await?;

        let process = self.client.exec(&args.sandbox_id, &args.command).await?;
        let output = self.client.wait(&process).await?;

        let image_id = if args.save_image_after_exec {
            Some(self.client.snapshot(&args.sandbox_id).await?)
        } else {
            None
        };

        tracing::debug!(
            sandbox_id = %args.sandbox_id,
            exit_code = output.exit_code,
            snapshot = ?image_id,
            "Command finished"
        );

        Ok(json!([output.exit_code, output.stdout, output.stderr, image_id]))
    }
}

#[async_trait]
impl Tool for ExecInSandboxTool {
    fn name(&self) -> &str {
        TOOL_EXEC
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
                "command": command_schema(),
                "save_image_after_exec": {
                    "type": "boolean",
                    "description": "Snapshot the filesystem after the command finishes.",
                    "default": true
                }
            },
            "required": ["sandbox_id", "command"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let args: ExecArgs = parse_args(TOOL_EXEC, args)?;

        if args.command.is_empty() {
            return Ok(ToolResult::failure("command cannot be empty"));
        }

        match self.run(&args).await {
            Ok(result) => Ok(ToolResult::json(&result)),
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to run command in sandbox {}: {e:#}",
                args.sandbox_id
            ))),
        }
    }
}
