//! Sandbox control-plane abstraction.
//!
//! Defines the [`ControlPlane`] trait and the request/response types that every
//! remote sandbox platform binding must implement. The provisioning, snapshot
//! and tunnel machinery all lives on the platform side; this layer only
//! describes what to ask for and what comes back.
//!
//! - [`http::HttpControlPlane`]: REST binding (requires an API token)
//! - `fake::FakeControlPlane`: in-memory platform used by the test suites

pub mod http;
pub mod image;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Captured result of a command that ran inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Handle to an execution started inside a sandbox.
///
/// Both fields are minted by the platform, so the handle stays meaningful
/// across restarts of this server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProcess {
    pub sandbox_id: String,
    pub process_id: String,
}

/// A network endpoint exposing one sandbox port to the outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunnel {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub unencrypted_host: Option<String>,
    #[serde(default)]
    pub unencrypted_port: Option<u16>,
}

impl Tunnel {
    /// Public HTTPS URL of the encrypted side of the tunnel.
    pub fn url(&self) -> String {
        if self.port == 443 {
            format!("https://{}", self.host)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }
}

/// Container port to tunnel mapping, ordered by port.
pub type Tunnels = BTreeMap<u16, Tunnel>;

/// Layered image description handed to the platform's image builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub python_version: String,
    pub apt_packages: Vec<String>,
    pub commands: Vec<String>,
}

/// A local directory to be made visible inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub local_dir: PathBuf,
    pub remote_path: String,
}

/// Everything the platform needs to start one sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateSandboxRequest {
    pub app_id: String,
    pub image_id: String,
    pub entrypoint: Vec<String>,
    pub gpu: Option<String>,
    pub mount_ids: Vec<String>,
    pub encrypted_ports: Vec<u16>,
    pub unencrypted_ports: Vec<u16>,
    pub timeout: u64,
}

/// Provider-agnostic sandbox control plane.
///
/// Every method maps to exactly one platform operation. Nothing is retried
/// and nothing is cached; failures come back to the caller as-is.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Look up the application namespace, creating it when missing. Returns its id.
    async fn ensure_app(&self, name: &str) -> anyhow::Result<String>;

    /// Build (or fetch from cache) an image for `spec`. Returns the image id.
    async fn build_image(&self, spec: &ImageSpec) -> anyhow::Result<String>;

    /// Upload a local directory so it can be attached at sandbox creation.
    async fn upload_mount(&self, app_id: &str, mount: &MountSpec) -> anyhow::Result<String>;

    /// Start a sandbox. Returns its id.
    async fn create(&self, request: &CreateSandboxRequest) -> anyhow::Result<String>;

    /// Fail unless `sandbox_id` names a sandbox the platform knows about.
    async fn lookup(&self, sandbox_id: &str) -> anyhow::Result<()>;

    /// Tunnels opened for the sandbox's exposed ports.
    async fn tunnels(&self, sandbox_id: &str) -> anyhow::Result<Tunnels>;

    /// Start `command` inside the sandbox without waiting for it.
    async fn exec(&self, sandbox_id: &str, command: &[String]) -> anyhow::Result<RemoteProcess>;

    /// Block until `process` exits and return its captured output.
    async fn wait(&self, process: &RemoteProcess) -> anyhow::Result<CommandOutput>;

    /// Exit code of the sandbox's main process, `None` while it is running.
    async fn poll(&self, sandbox_id: &str) -> anyhow::Result<Option<i32>>;

    /// Stop the sandbox and release its resources.
    async fn terminate(&self, sandbox_id: &str) -> anyhow::Result<()>;

    /// Capture the sandbox filesystem. Returns the new image id.
    async fn snapshot(&self, sandbox_id: &str) -> anyhow::Result<String>;

    /// Resolve a previously captured image id so it can be used for `create`.
    async fn resolve_image(&self, image_id: &str) -> anyhow::Result<String>;
}
