//! Tool catalogue exposed to the calling agent.

pub mod sandbox;
pub mod time;
pub mod traits;

pub use traits::{Tool, ToolResult, ToolSpec};

use crate::config::Config;
use crate::processes::ProcessRegistry;
use crate::sandbox::ControlPlane;
use std::sync::Arc;

/// Build the full, fixed tool set in catalogue order.
pub fn all_tools(
    client: Arc<dyn ControlPlane>,
    processes: Arc<ProcessRegistry>,
    config: &Config,
) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(time::GetCurrentTimeTool::new()),
        Arc::new(sandbox::CreateSandboxTool::from_config(
            client.clone(),
            config,
        )?),
        Arc::new(sandbox::RestoreSandboxTool::from_config(
            client.clone(),
            config,
        )),
        Arc::new(sandbox::TerminateSandboxTool::new(client.clone())),
        Arc::new(sandbox::CheckSandboxStatusTool::new(client.clone())),
        Arc::new(sandbox::ExecInSandboxTool::new(client.clone())),
        Arc::new(sandbox::ExecInSandboxBackgroundTool::new(
            client.clone(),
            processes.clone(),
        )),
        Arc::new(sandbox::WaitForProcessTool::new(client, processes)),
    ];
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::fake::FakeControlPlane;

    #[test]
    fn catalogue_is_fixed_and_ordered() {
        let tools = all_tools(
            Arc::new(FakeControlPlane::new()),
            Arc::new(ProcessRegistry::in_memory()),
            &Config::default(),
        )
        .unwrap();

        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "get_current_time",
                "create_sandbox",
                "restore_sandbox",
                "terminate_sandbox",
                "check_sandbox_status",
                "exec_in_sandbox",
                "exec_in_sandbox_background",
                "wait_for_process",
            ]
        );
    }

    #[test]
    fn every_schema_is_an_object_with_known_required_fields() {
        let tools = all_tools(
            Arc::new(FakeControlPlane::new()),
            Arc::new(ProcessRegistry::in_memory()),
            &Config::default(),
        )
        .unwrap();

        for tool in &tools {
            let spec = tool.spec();
            assert!(!spec.description.is_empty(), "{}", spec.name);
            assert_eq!(spec.parameters["type"], "object", "{}", spec.name);

            let properties = spec.parameters["properties"].as_object().unwrap();
            for required in spec.parameters["required"].as_array().unwrap() {
                assert!(
                    properties.contains_key(required.as_str().unwrap()),
                    "{} requires undeclared {required}",
                    spec.name
                );
            }
        }
    }
}
