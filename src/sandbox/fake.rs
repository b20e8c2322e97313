//! In-memory [`ControlPlane`] used by the unit tests.
//!
//! Understands a handful of commands (`echo`, `true`, `false`, `sleep`) and
//! records every request so tests can assert on what reached the platform.

use super::{
    CommandOutput, ControlPlane, CreateSandboxRequest, ImageSpec, MountSpec, RemoteProcess,
    Tunnel, Tunnels,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

struct FakeSandbox {
    request: CreateSandboxRequest,
    exit_code: Option<i32>,
}

struct FakeProcess {
    sandbox_id: String,
    output: CommandOutput,
    delay: Duration,
}

#[derive(Default)]
pub struct FakeControlPlane {
    next: AtomicU64,
    sandboxes: Mutex<HashMap<String, FakeSandbox>>,
    processes: Mutex<HashMap<String, FakeProcess>>,
    images: Mutex<Vec<String>>,
    aliases: Mutex<HashMap<String, String>>,
    pub built_images: Mutex<Vec<ImageSpec>>,
    pub mounts: Mutex<Vec<MountSpec>>,
    pub snapshots: Mutex<Vec<String>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Request the sandbox was created with.
    pub fn created(&self, sandbox_id: &str) -> Option<CreateSandboxRequest> {
        self.sandboxes
            .lock()
            .get(sandbox_id)
            .map(|sb| sb.request.clone())
    }

    /// Register an image id as if it had been produced elsewhere.
    pub fn add_image(&self, image_id: &str) {
        self.images.lock().push(image_id.to_string());
    }

    /// Make `alias` resolve to `image_id`.
    pub fn add_image_alias(&self, alias: &str, image_id: &str) {
        self.aliases
            .lock()
            .insert(alias.to_string(), image_id.to_string());
    }

    fn require_running(&self, sandbox_id: &str) -> anyhow::Result<()> {
        match self.sandboxes.lock().get(sandbox_id) {
            None => anyhow::bail!("Sandbox {sandbox_id} not found"),
            Some(sb) if sb.exit_code.is_some() => {
                anyhow::bail!("Sandbox {sandbox_id} has already finished")
            }
            Some(_) => Ok(()),
        }
    }

    fn run(command: &[String]) -> (CommandOutput, Duration) {
        let ok = |stdout: String| CommandOutput {
            exit_code: 0,
            stdout,
            stderr: String::new(),
        };
        match command.first().map(String::as_str) {
            Some("echo") => (ok(format!("{}\n", command[1..].join(" "))), Duration::ZERO),
            Some("true") => (ok(String::new()), Duration::ZERO),
            Some("false") => (
                CommandOutput {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: String::new(),
                },
                Duration::ZERO,
            ),
            Some("sleep") => {
                let secs: f64 = command
                    .get(1)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.0);
                // Scaled down so scenario tests stay fast.
                (ok(String::new()), Duration::from_secs_f64(secs / 100.0))
            }
            Some(other) => (
                CommandOutput {
                    exit_code: 127,
                    stdout: String::new(),
                    stderr: format!("{other}: command not found\n"),
                },
                Duration::ZERO,
            ),
            None => (
                CommandOutput {
                    exit_code: 127,
                    stdout: String::new(),
                    stderr: "empty command\n".to_string(),
                },
                Duration::ZERO,
            ),
        }
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn ensure_app(&self, name: &str) -> anyhow::Result<String> {
        Ok(format!("ap-{name}"))
    }

    async fn build_image(&self, spec: &ImageSpec) -> anyhow::Result<String> {
        self.built_images.lock().push(spec.clone());
        let image_id = self.mint("im");
        self.images.lock().push(image_id.clone());
        Ok(image_id)
    }

    async fn upload_mount(&self, _app_id: &str, mount: &MountSpec) -> anyhow::Result<String> {
        self.mounts.lock().push(mount.clone());
        Ok(self.mint("mo"))
    }

    async fn create(&self, request: &CreateSandboxRequest) -> anyhow::Result<String> {
        anyhow::ensure!(
            self.images.lock().contains(&request.image_id),
            "Image {} not found",
            request.image_id
        );
        let sandbox_id = self.mint("sb");
        self.sandboxes.lock().insert(
            sandbox_id.clone(),
            FakeSandbox {
                request: request.clone(),
                exit_code: None,
            },
        );
        Ok(sandbox_id)
    }

    async fn lookup(&self, sandbox_id: &str) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sandboxes.lock().contains_key(sandbox_id),
            "Sandbox {sandbox_id} not found"
        );
        Ok(())
    }

    async fn tunnels(&self, sandbox_id: &str) -> anyhow::Result<Tunnels> {
        let sandboxes = self.sandboxes.lock();
        let sandbox = sandboxes
            .get(sandbox_id)
            .ok_or_else(|| anyhow::anyhow!("Sandbox {sandbox_id} not found"))?;

        let mut tunnels = Tunnels::new();
        for port in &sandbox.request.encrypted_ports {
            tunnels.insert(
                *port,
                Tunnel {
                    host: format!("{sandbox_id}-{port}.tunnel.test"),
                    port: 443,
                    unencrypted_host: None,
                    unencrypted_port: None,
                },
            );
        }
        for port in &sandbox.request.unencrypted_ports {
            tunnels.insert(
                *port,
                Tunnel {
                    host: format!("{sandbox_id}-{port}.tunnel.test"),
                    port: 443,
                    unencrypted_host: Some("r3.tunnel.test".to_string()),
                    unencrypted_port: Some(40_000 + *port),
                },
            );
        }
        Ok(tunnels)
    }

    async fn exec(&self, sandbox_id: &str, command: &[String]) -> anyhow::Result<RemoteProcess> {
        self.require_running(sandbox_id)?;
        let (output, delay) = Self::run(command);
        let process_id = self.mint("pr");
        self.processes.lock().insert(
            process_id.clone(),
            FakeProcess {
                sandbox_id: sandbox_id.to_string(),
                output,
                delay,
            },
        );
        Ok(RemoteProcess {
            sandbox_id: sandbox_id.to_string(),
            process_id,
        })
    }

    async fn wait(&self, process: &RemoteProcess) -> anyhow::Result<CommandOutput> {
        let (output, delay) = {
            let processes = self.processes.lock();
            let found = processes
                .get(&process.process_id)
                .filter(|p| p.sandbox_id == process.sandbox_id)
                .ok_or_else(|| anyhow::anyhow!("Process {} not found", process.process_id))?;
            (found.output.clone(), found.delay)
        };
        tokio::time::sleep(delay).await;
        Ok(output)
    }

    async fn poll(&self, sandbox_id: &str) -> anyhow::Result<Option<i32>> {
        self.sandboxes
            .lock()
            .get(sandbox_id)
            .map(|sb| sb.exit_code)
            .ok_or_else(|| anyhow::anyhow!("Sandbox {sandbox_id} not found"))
    }

    async fn terminate(&self, sandbox_id: &str) -> anyhow::Result<()> {
        let mut sandboxes = self.sandboxes.lock();
        let sandbox = sandboxes
            .get_mut(sandbox_id)
            .ok_or_else(|| anyhow::anyhow!("Sandbox {sandbox_id} not found"))?;
        sandbox.exit_code.get_or_insert(0);
        Ok(())
    }

    async fn snapshot(&self, sandbox_id: &str) -> anyhow::Result<String> {
        self.require_running(sandbox_id)?;
        let image_id = self.mint("im");
        self.images.lock().push(image_id.clone());
        self.snapshots.lock().push(image_id.clone());
        Ok(image_id)
    }

    async fn resolve_image(&self, image_id: &str) -> anyhow::Result<String> {
        let image_id = self
            .aliases
            .lock()
            .get(image_id)
            .cloned()
            .unwrap_or_else(|| image_id.to_string());
        anyhow::ensure!(
            self.images.lock().iter().any(|i| *i == image_id),
            "Image {image_id} not found"
        );
        Ok(image_id)
    }
}
