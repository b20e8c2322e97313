//! Configuration loading.
//!
//! Resolution order: built-in defaults, then `config.toml` (from `--config`,
//! `SANDBOX_MCP_CONFIG`, or the platform config directory), then environment
//! overrides. A missing default config file is not an error.

pub mod schema;

pub use schema::{Config, ControlPlaneConfig, SandboxConfig, StoreConfig};

use anyhow::Context;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "SANDBOX_MCP_CONFIG";
pub const API_TOKEN_ENV: &str = "SANDBOX_API_TOKEN";
pub const API_BASE_ENV: &str = "SANDBOX_API_BASE";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "sandbox-mcp", "sandbox-mcp")
}

/// Default location of `config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Expand `~` and `$VARS` in a configured path.
pub fn expand_path(raw: &str) -> anyhow::Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("Failed to expand path {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

impl Config {
    /// Load configuration for this process.
    ///
    /// An explicitly named file must exist; the default location may be absent.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let explicit = explicit.map(Path::to_path_buf).or(from_env);

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a single TOML file. Unrecognised keys are collected in
    /// `unknown_keys` so they can be reported once logging is up.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let deserializer = toml::Deserializer::parse(raw)?;
        let mut ignored = Vec::new();
        let mut config: Self = serde_ignored::deserialize(deserializer, |path| {
            ignored.push(path.to_string());
        })?;
        config.unknown_keys = ignored;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.control_plane.api_token = Some(token.trim().to_string());
            }
        }
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                self.control_plane.api_base = base.trim().to_string();
            }
        }
    }

    /// Path of the SSH public key, with `~` expanded.
    pub fn ssh_public_key_path(&self) -> anyhow::Result<PathBuf> {
        expand_path(&self.sandbox.ssh_public_key_path)
    }

    /// Path of the state database, or `None` when persistence is disabled.
    pub fn db_path(&self) -> anyhow::Result<Option<PathBuf>> {
        if !self.store.persist_processes {
            return Ok(None);
        }
        match &self.store.db_path {
            Some(raw) => expand_path(raw).map(Some),
            None => project_dirs()
                .map(|dirs| Some(dirs.data_dir().join("state.db")))
                .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory; set [store] db_path")),
        }
    }
}
