//! REST binding of the [`ControlPlane`] trait.
//!
//! One method, one HTTP call. Responses are checked for a success status and
//! the raw body is kept in the error so the calling agent sees the platform's
//! own diagnostic text.

use super::{
    CommandOutput, ControlPlane, CreateSandboxRequest, ImageSpec, MountSpec, RemoteProcess,
    Tunnel, Tunnels,
};
use crate::config::ControlPlaneConfig;
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use walkdir::WalkDir;

/// Default base URL for the control-plane REST API.
pub const DEFAULT_API_BASE: &str = "https://api.sandbox.dev";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct AppResponse {
    #[serde(alias = "appId")]
    app_id: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(alias = "imageId")]
    image_id: String,
}

#[derive(Debug, Deserialize)]
struct MountResponse {
    #[serde(alias = "mountId")]
    mount_id: String,
}

#[derive(Debug, Deserialize)]
struct SandboxResponse {
    #[serde(alias = "sandboxId")]
    sandbox_id: String,
    #[serde(default, alias = "exitCode")]
    exit_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TunnelEntry {
    #[serde(alias = "containerPort")]
    container_port: u16,
    #[serde(flatten)]
    tunnel: Tunnel,
}

#[derive(Debug, Deserialize)]
struct TunnelsResponse {
    tunnels: Vec<TunnelEntry>,
}

#[derive(Debug, Deserialize)]
struct ExecResponse {
    #[serde(alias = "processId")]
    process_id: String,
}

#[derive(Debug, Deserialize)]
struct WaitResponse {
    #[serde(alias = "exitCode")]
    exit_code: i32,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

/// HTTP client for the sandbox control-plane API.
pub struct HttpControlPlane {
    api_base: String,
    api_token: String,
    request_timeout: Duration,
    http: reqwest::Client,
}

impl HttpControlPlane {
    pub fn new(
        api_base: impl Into<String>,
        api_token: impl Into<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        // No client-wide timeout: exec, wait and image builds block for as
        // long as the remote work takes.
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            request_timeout,
            http,
        })
    }

    pub fn from_config(config: &ControlPlaneConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.api_base,
            config.api_token.clone().unwrap_or_default(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn sandbox_url(&self, sandbox_id: &str, suffix: &str) -> String {
        self.url(&format!(
            "/v1/sandboxes/{}{suffix}",
            urlencoding::encode(sandbox_id)
        ))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> anyhow::Result<reqwest::RequestBuilder> {
        anyhow::ensure!(
            !self.api_token.is_empty(),
            "Sandbox API token is not set (configure control_plane.api_token or SANDBOX_API_TOKEN)"
        );
        Ok(builder.bearer_auth(&self.api_token))
    }

    async fn send_raw(
        &self,
        what: &str,
        builder: reqwest::RequestBuilder,
    ) -> anyhow::Result<String> {
        let resp = self
            .authorized(builder)?
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Sandbox API {what} request failed: {e}"))?;

        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".to_string());

        anyhow::ensure!(
            status.is_success(),
            "Sandbox API {what} returned {status}: {body_text}"
        );

        Ok(body_text)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        what: &str,
        builder: reqwest::RequestBuilder,
    ) -> anyhow::Result<T> {
        let body_text = self.send_raw(what, builder).await?;
        serde_json::from_str(&body_text).map_err(|e| {
            anyhow::anyhow!("Failed to parse Sandbox API {what} response: {e}\nBody: {body_text}")
        })
    }

    async fn get_sandbox(&self, sandbox_id: &str) -> anyhow::Result<SandboxResponse> {
        let request = self
            .http
            .get(self.sandbox_url(sandbox_id, ""))
            .timeout(self.request_timeout);
        self.send_json("lookup", request).await
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn ensure_app(&self, name: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "name": name,
            "create_if_missing": true,
        });
        let request = self
            .http
            .post(self.url("/v1/apps"))
            .timeout(self.request_timeout)
            .json(&body);

        let app: AppResponse = self.send_json("app lookup", request).await?;
        Ok(app.app_id)
    }

    async fn build_image(&self, spec: &ImageSpec) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "base": { "kind": "debian_slim", "python_version": spec.python_version },
            "apt_packages": spec.apt_packages,
            "commands": spec.commands,
        });
        let request = self.http.post(self.url("/v1/images")).json(&body);

        let image: ImageResponse = self.send_json("image build", request).await?;
        Ok(image.image_id)
    }

    async fn upload_mount(&self, app_id: &str, mount: &MountSpec) -> anyhow::Result<String> {
        anyhow::ensure!(
            mount.local_dir.is_dir(),
            "Mount directory {} does not exist or is not a directory",
            mount.local_dir.display()
        );

        let mut form = reqwest::multipart::Form::new()
            .text("app_id", app_id.to_string())
            .text("remote_path", mount.remote_path.clone());

        let mut file_count = 0usize;
        for entry in WalkDir::new(&mount.local_dir).follow_links(false) {
            let entry = entry.with_context(|| {
                format!("Failed to walk mount directory {}", mount.local_dir.display())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&mount.local_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let bytes = tokio::fs::read(entry.path())
                .await
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;

            form = form.part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(relative),
            );
            file_count += 1;
        }

        tracing::debug!(
            local_dir = %mount.local_dir.display(),
            remote_path = %mount.remote_path,
            file_count,
            "Uploading mount"
        );

        let request = self.http.post(self.url("/v1/mounts")).multipart(form);
        let uploaded: MountResponse = self.send_json("mount upload", request).await?;
        Ok(uploaded.mount_id)
    }

    async fn create(&self, request: &CreateSandboxRequest) -> anyhow::Result<String> {
        let builder = self.http.post(self.url("/v1/sandboxes")).json(request);
        let created: SandboxResponse = self.send_json("create sandbox", builder).await?;

        anyhow::ensure!(
            !created.sandbox_id.is_empty(),
            "Sandbox API returned an empty sandbox_id"
        );
        Ok(created.sandbox_id)
    }

    async fn lookup(&self, sandbox_id: &str) -> anyhow::Result<()> {
        self.get_sandbox(sandbox_id).await.map(|_| ())
    }

    async fn tunnels(&self, sandbox_id: &str) -> anyhow::Result<Tunnels> {
        let request = self
            .http
            .get(self.sandbox_url(sandbox_id, "/tunnels"))
            .timeout(self.request_timeout);
        let parsed: TunnelsResponse = self.send_json("tunnels", request).await?;

        Ok(parsed
            .tunnels
            .into_iter()
            .map(|entry| (entry.container_port, entry.tunnel))
            .collect())
    }

    async fn exec(&self, sandbox_id: &str, command: &[String]) -> anyhow::Result<RemoteProcess> {
        let body = serde_json::json!({ "command": command });
        let request = self
            .http
            .post(self.sandbox_url(sandbox_id, "/exec"))
            .timeout(self.request_timeout)
            .json(&body);
        let started: ExecResponse = self.send_json("exec", request).await?;

        Ok(RemoteProcess {
            sandbox_id: sandbox_id.to_string(),
            process_id: started.process_id,
        })
    }

    async fn wait(&self, process: &RemoteProcess) -> anyhow::Result<CommandOutput> {
        let suffix = format!(
            "/processes/{}/wait",
            urlencoding::encode(&process.process_id)
        );
        let request = self.http.post(self.sandbox_url(&process.sandbox_id, &suffix));
        let finished: WaitResponse = self.send_json("wait", request).await?;

        Ok(CommandOutput {
            exit_code: finished.exit_code,
            stdout: finished.stdout,
            stderr: finished.stderr,
        })
    }

    async fn poll(&self, sandbox_id: &str) -> anyhow::Result<Option<i32>> {
        Ok(self.get_sandbox(sandbox_id).await?.exit_code)
    }

    async fn terminate(&self, sandbox_id: &str) -> anyhow::Result<()> {
        let request = self
            .http
            .delete(self.sandbox_url(sandbox_id, ""))
            .timeout(self.request_timeout);
        self.send_raw("terminate", request).await.map(|_| ())
    }

    async fn snapshot(&self, sandbox_id: &str) -> anyhow::Result<String> {
        let request = self.http.post(self.sandbox_url(sandbox_id, "/snapshot"));
        let image: ImageResponse = self.send_json("snapshot", request).await?;
        Ok(image.image_id)
    }

    async fn resolve_image(&self, image_id: &str) -> anyhow::Result<String> {
        let request = self
            .http
            .get(self.url(&format!("/v1/images/{}", urlencoding::encode(image_id))))
            .timeout(self.request_timeout);
        let image: ImageResponse = self.send_json("image lookup", request).await?;
        Ok(image.image_id)
    }
}
