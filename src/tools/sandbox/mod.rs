//! Sandbox lifecycle tools.
//!
//! Seven tools that delegate to a [`ControlPlane`](crate::sandbox::ControlPlane)
//! implementation. Each one maps its arguments onto one or more control-plane
//! calls and renders the answer as JSON; none of them keep sandbox state.

pub mod background;
pub mod create;
pub mod exec;
pub mod restore;
pub mod status;
pub mod terminate;
pub mod wait;

pub use background::ExecInSandboxBackgroundTool;
pub use create::CreateSandboxTool;
pub use exec::ExecInSandboxTool;
pub use restore::RestoreSandboxTool;
pub use status::CheckSandboxStatusTool;
pub use terminate::TerminateSandboxTool;
pub use wait::WaitForProcessTool;

use crate::sandbox::Tunnels;
use serde_json::{Map, Value};

/// Tool name constants for reference.
pub const TOOL_CREATE: &str = "create_sandbox";
pub const TOOL_RESTORE: &str = "restore_sandbox";
pub const TOOL_TERMINATE: &str = "terminate_sandbox";
pub const TOOL_STATUS: &str = "check_sandbox_status";
pub const TOOL_EXEC: &str = "exec_in_sandbox";
pub const TOOL_EXEC_BACKGROUND: &str = "exec_in_sandbox_background";
pub const TOOL_WAIT: &str = "wait_for_process";

/// Usage notes shared by both exec tools.
pub(crate) const EXEC_USAGE: &str = "The command is an argument vector, e.g. ['ls', '-l', '/']. \
     It is executed directly, not through a shell: there is no state between calls, so to run \
     something in another directory pass e.g. ['bash', '-c', 'cd /root/app && make'].";

/// `{"8000": "https://..."}` view of a tunnel map.
pub(crate) fn tunnel_urls(tunnels: &Tunnels) -> Value {
    let urls: Map<String, Value> = tunnels
        .iter()
        .map(|(port, tunnel)| (port.to_string(), Value::String(tunnel.url())))
        .collect();
    Value::Object(urls)
}

/// JSON schema fragment for a command argument vector.
pub(crate) fn command_schema() -> Value {
    serde_json::json!({
        "type": "array",
        "items": { "type": "string" },
        "minItems": 1,
        "description": "Command as a list of arguments, e.g. [\"ls\", \"-l\", \"/\"]."
    })
}
