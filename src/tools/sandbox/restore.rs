//! `restore_sandbox` tool: start a fresh sandbox from a filesystem snapshot.

use super::{tunnel_urls, TOOL_RESTORE};
use crate::config::Config;
use crate::sandbox::{ControlPlane, CreateSandboxRequest};
use crate::tools::traits::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RestoreArgs {
    image_id: String,
}

pub struct RestoreSandboxTool {
    client: Arc<dyn ControlPlane>,
    app_name: String,
    encrypted_ports: Vec<u16>,
    timeout_secs: u64,
}

impl RestoreSandboxTool {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        app_name: impl Into<String>,
        encrypted_ports: Vec<u16>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            app_name: app_name.into(),
            encrypted_ports,
            timeout_secs,
        }
    }

    pub fn from_config(client: Arc<dyn ControlPlane>, config: &Config) -> Self {
        Self::new(
            client,
            &config.control_plane.app_name,
            config.sandbox.encrypted_ports.clone(),
            config.sandbox.restore_timeout_secs,
        )
    }

    async fn restore(&self, image_id: &str) -> anyhow::Result<serde_json::Value> {
        let app_id = self.client.ensure_app(&self.app_name).await?;
        let resolved = self.client.resolve_image(image_id).await?;

        let request = CreateSandboxRequest {
            app_id,
            image_id: resolved,
            encrypted_ports: self.encrypted_ports.clone(),
            timeout: self.timeout_secs,
            ..Default::default()
        };
        let sandbox_id = self.client.create(&request).await?;
        tracing::info!(%sandbox_id, image_id, resolved = %request.image_id, "Sandbox restored from snapshot");

        let tunnels = self.client.tunnels(&sandbox_id).await?;
        Ok(json!({
            "sandbox_id": sandbox_id,
            "tunnels": tunnel_urls(&tunnels),
            "image_id": image_id,
        }))
    }
}

#[async_trait]
impl Tool for RestoreSandboxTool {
    fn name(&self) -> &str {
        TOOL_RESTORE
    }

    fn description(&self) -> &str {
        "Start a new sandbox from a filesystem snapshot. Pass the image_id returned by \
         exec_in_sandbox. Returns the new sandbox_id, its port -> URL tunnel map and the image_id. \
         Restored sandboxes stop after 4 minutes and do not run an SSH server."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "image_id": {
                    "type": "string",
                    "description": "Snapshot image id to restore from."
                }
            },
            "required": ["image_id"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let args: RestoreArgs = parse_args(TOOL_RESTORE, args)?;

        match self.restore(&args.image_id).await {
            Ok(restored) => Ok(ToolResult::json(&restored)),
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to restore sandbox from {}: {e:#}",
                args.image_id
            ))),
        }
    }
}
