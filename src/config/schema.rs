use crate::sandbox::http::DEFAULT_API_BASE;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Log filter used when `RUST_LOG` is not set (e.g. `info`, `sandbox_mcp=debug`).
    pub log_level: String,
    pub control_plane: ControlPlaneConfig,
    pub sandbox: SandboxConfig,
    pub store: StoreConfig,
    /// Keys present in the file that no setting matched.
    #[serde(skip)]
    pub unknown_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            control_plane: ControlPlaneConfig::default(),
            sandbox: SandboxConfig::default(),
            store: StoreConfig::default(),
            unknown_keys: Vec::new(),
        }
    }
}

/// Remote sandbox platform connection.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Base URL of the control-plane REST API.
    pub api_base: String,
    /// Bearer token. `SANDBOX_API_TOKEN` takes precedence when set.
    pub api_token: Option<String>,
    /// Application namespace sandboxes are created under.
    pub app_name: String,
    /// Timeout for non-blocking API calls (lookup, poll, tunnels, terminate).
    pub request_timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_token: None,
            app_name: "modal-sandbox".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Sandbox provisioning defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Public key injected into `authorized_keys` of new sandboxes.
    pub ssh_public_key_path: String,
    /// Python version of the Debian slim base image.
    pub python_version: String,
    /// Ports exposed through encrypted tunnels.
    pub encrypted_ports: Vec<u16>,
    /// Port sshd listens on, exposed unencrypted.
    pub ssh_port: u16,
    /// Idle timeout for `create_sandbox` when the caller gives none.
    pub default_timeout_secs: u64,
    /// Timeout of sandboxes started by `restore_sandbox`.
    pub restore_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            ssh_public_key_path: "~/.ssh/id_ed25519.pub".to_string(),
            python_version: "3.11".to_string(),
            encrypted_ports: vec![8000, 8001, 8002],
            ssh_port: 22,
            default_timeout_secs: 60 * 20,
            restore_timeout_secs: 60 * 4,
        }
    }
}

/// Local state persistence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Mirror background process handles to SQLite so they survive restarts.
    pub persist_processes: bool,
    /// Database path. Defaults to `state.db` in the platform data directory.
    pub db_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_processes: true,
            db_path: None,
        }
    }
}
