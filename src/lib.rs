//! sandbox-mcp: remote sandbox lifecycle operations exposed as MCP tools.
//!
//! The crate is a thin adapter. Provisioning, snapshots and tunnels belong
//! to the remote platform behind [`sandbox::ControlPlane`]; what lives here is
//! the tool catalogue ([`tools`]), the MCP front-end ([`server`]) and the
//! background process registry ([`processes`]).

pub mod config;
pub mod processes;
pub mod sandbox;
pub mod server;
pub mod store;
pub mod tools;

use processes::ProcessRegistry;
use std::sync::Arc;

/// Wire the control plane, process registry and tools for `config`.
pub fn build_server(config: &config::Config) -> anyhow::Result<server::SandboxServer> {
    let processes = match config.db_path()? {
        Some(db_path) => {
            tracing::debug!(db_path = %db_path.display(), "Opening state database");
            ProcessRegistry::with_store(store::init_db(&db_path)?)?
        }
        None => ProcessRegistry::in_memory(),
    };
    server_with(config, processes)
}

/// Server used only to describe the tool catalogue. Never touches the state
/// database.
pub fn catalogue_server(config: &config::Config) -> anyhow::Result<server::SandboxServer> {
    server_with(config, ProcessRegistry::in_memory())
}

fn server_with(
    config: &config::Config,
    processes: ProcessRegistry,
) -> anyhow::Result<server::SandboxServer> {
    let client: Arc<dyn sandbox::ControlPlane> =
        Arc::new(sandbox::http::HttpControlPlane::from_config(&config.control_plane)?);
    let tools = tools::all_tools(client, Arc::new(processes), config)?;
    Ok(server::SandboxServer::new(tools))
}
