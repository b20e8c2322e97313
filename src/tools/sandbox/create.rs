//! `create_sandbox` tool: provision an SSH-reachable sandbox.

use super::{tunnel_urls, TOOL_CREATE};
use crate::config::{Config, SandboxConfig};
use crate::sandbox::image::{remote_mount_path, ssh_image, sshd_entrypoint};
use crate::sandbox::{ControlPlane, CreateSandboxRequest, MountSpec};
use crate::tools::traits::{parse_args, Tool, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CreateArgs {
    timeout: Option<u64>,
    mount_dir: Option<String>,
    gpu: Option<String>,
}

pub struct CreateSandboxTool {
    client: Arc<dyn ControlPlane>,
    app_name: String,
    ssh_key_path: PathBuf,
    settings: SandboxConfig,
    description: String,
}

impl CreateSandboxTool {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        app_name: impl Into<String>,
        ssh_key_path: impl Into<PathBuf>,
        settings: SandboxConfig,
    ) -> Self {
        let description = describe(&settings);
        Self {
            client,
            app_name: app_name.into(),
            ssh_key_path: ssh_key_path.into(),
            settings,
            description,
        }
    }

    pub fn from_config(client: Arc<dyn ControlPlane>, config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            client,
            &config.control_plane.app_name,
            config.ssh_public_key_path()?,
            config.sandbox.clone(),
        ))
    }

    async fn read_public_key(&self) -> anyhow::Result<String> {
        let key = tokio::fs::read_to_string(&self.ssh_key_path)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to read SSH public key at {}: {e}",
                    self.ssh_key_path.display()
                )
            })?;
        anyhow::ensure!(
            !key.trim().is_empty(),
            "SSH public key at {} is empty",
            self.ssh_key_path.display()
        );
        Ok(key)
    }

    async fn provision(&self, args: CreateArgs) -> anyhow::Result<serde_json::Value> {
        let public_key = self.read_public_key().await?;
        let timeout = args.timeout.unwrap_or(self.settings.default_timeout_secs);

        let app_id = self.client.ensure_app(&self.app_name).await?;
        let image_id = self
            .client
            .build_image(&ssh_image(&self.settings.python_version, &public_key))
            .await?;

        let mut mount_ids = Vec::new();
        if let Some(local_dir) = args.mount_dir.as_deref().filter(|d| !d.is_empty()) {
            let local_dir = Path::new(local_dir);
            let mount = MountSpec {
                local_dir: local_dir.to_path_buf(),
                remote_path: remote_mount_path(local_dir),
            };
            mount_ids.push(self.client.upload_mount(&app_id, &mount).await?);
        }

        let ssh_port = self.settings.ssh_port;
        let request = CreateSandboxRequest {
            app_id,
            image_id,
            entrypoint: sshd_entrypoint(ssh_port),
            gpu: args.gpu.filter(|g| !g.is_empty()),
            mount_ids,
            encrypted_ports: self.settings.encrypted_ports.clone(),
            unencrypted_ports: vec![ssh_port],
            timeout,
        };

        let sandbox_id = self.client.create(&request).await?;
        tracing::info!(%sandbox_id, timeout, gpu = ?request.gpu, "Sandbox created");

        let mut tunnels = self.client.tunnels(&sandbox_id).await?;
        let ssh_tunnel = tunnels.remove(&ssh_port).ok_or_else(|| {
            anyhow::anyhow!("Sandbox {sandbox_id} exposed no tunnel for SSH port {ssh_port}")
        })?;
        let (Some(ssh_host), Some(ssh_tunnel_port)) =
            (ssh_tunnel.unencrypted_host, ssh_tunnel.unencrypted_port)
        else {
            anyhow::bail!("SSH tunnel of sandbox {sandbox_id} has no unencrypted endpoint");
        };

        Ok(json!({
            "sandbox_id": sandbox_id,
            "tunnels": tunnel_urls(&tunnels),
            "ssh_host": ssh_host,
            "ssh_port": ssh_tunnel_port,
        }))
    }
}

fn describe(settings: &SandboxConfig) -> String {
    let ports = settings
        .encrypted_ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Create a new sandbox and return its sandbox_id, its tunnels and SSH connection details.\n\n\
         The image is minimal (Debian slim with Python {python}, git, openssh-server and rsync); \
         install anything else with exec_in_sandbox. Ports {ports} are reachable from outside \
         through encrypted tunnels, returned as a port -> URL map. No other port is reachable \
         except SSH.\n\n\
         The sandbox stops after `timeout` seconds (default {timeout}). Save work with \
         exec_in_sandbox (it snapshots the filesystem by default) and bring it back with \
         restore_sandbox.\n\n\
         Your local public key is authorized for root, so show the user an ssh command such as \
         `ssh -p <ssh_port> root@<ssh_host>`. Use rsync or scp over the same connection to copy \
         files in or out.\n\n\
         Pass mount_dir to mount a local directory at /root/<last path component>.\n\n\
         Pass gpu to attach GPUs: one of T4, L4, A10G, A100-40GB, A100-80GB, H100, H200. \
         Append '!' to the type to forbid substitutes (e.g. 'H100!') and ':<count>' for several \
         GPUs (e.g. 'T4:4').",
        python = settings.python_version,
        timeout = settings.default_timeout_secs,
    )
}

#[async_trait]
impl Tool for CreateSandboxTool {
    fn name(&self) -> &str {
        TOOL_CREATE
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "timeout": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Seconds before the sandbox is stopped.",
                    "default": self.settings.default_timeout_secs
                },
                "mount_dir": {
                    "type": ["string", "null"],
                    "description": "Local directory to mount inside the sandbox."
                },
                "gpu": {
                    "type": ["string", "null"],
                    "description": "GPU request, e.g. 'A10G', 'H100!' or 'T4:4'."
                }
            },
            "required": []
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let args: CreateArgs = parse_args(TOOL_CREATE, args)?;

        match self.provision(args).await {
            Ok(created) => Ok(ToolResult::json(&created)),
            Err(e) => Ok(ToolResult::failure(format!("Failed to create sandbox: {e:#}"))),
        }
    }
}
