//! MCP front-end: advertises the tool catalogue and dispatches `tools/call`
//! requests to the matching [`Tool`].

use crate::tools::{Tool, ToolResult, ToolSpec};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ListToolsResult, PaginatedRequestParam,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

const INSTRUCTIONS: &str = "Tools for remote development sandboxes. Create a sandbox with \
    create_sandbox (or restore_sandbox from a snapshot image id), run commands with \
    exec_in_sandbox or exec_in_sandbox_background + wait_for_process, and stop it with \
    terminate_sandbox.";

/// Outcome of dispatching one call, before it is shaped into an MCP result.
#[derive(Debug)]
pub enum Dispatch {
    Completed(ToolResult),
    Failed(String),
    UnknownTool(String),
}

#[derive(Clone)]
pub struct SandboxServer {
    tools: Arc<Vec<Arc<dyn Tool>>>,
}

impl SandboxServer {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            tools: Arc::new(tools),
        }
    }

    /// Tool specs in catalogue order.
    pub fn catalogue(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Run the named tool with `args` (an absent argument map counts as empty).
    pub async fn dispatch(&self, name: &str, args: Option<Map<String, Value>>) -> Dispatch {
        let Some(tool) = self.find(name) else {
            tracing::warn!(tool = name, "Call to unknown tool");
            return Dispatch::UnknownTool(name.to_string());
        };

        let args = Value::Object(args.unwrap_or_default());
        let started = Instant::now();
        tracing::info!(tool = name, "Tool call");

        let outcome = match tool.execute(args).await {
            Ok(result) => Dispatch::Completed(result),
            Err(e) => Dispatch::Failed(format!("{e:#}")),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Dispatch::Completed(result) if result.success => {
                tracing::debug!(tool = name, elapsed_ms, "Tool call succeeded");
            }
            Dispatch::Completed(ToolResult { error, .. }) => {
                tracing::warn!(tool = name, elapsed_ms, error = ?error, "Tool call failed");
            }
            Dispatch::Failed(error) | Dispatch::UnknownTool(error) => {
                tracing::warn!(tool = name, elapsed_ms, %error, "Tool call rejected");
            }
        }
        outcome
    }
}

fn to_mcp_tool(spec: ToolSpec) -> rmcp::model::Tool {
    let schema = match spec.parameters {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    rmcp::model::Tool::new(spec.name, spec.description, Arc::new(schema))
}

fn to_call_result(result: ToolResult) -> CallToolResult {
    if result.success {
        let content = if result.output.is_empty() {
            Vec::new()
        } else {
            vec![Content::text(result.output)]
        };
        CallToolResult::success(content)
    } else {
        let message = result
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or(result.output);
        CallToolResult::error(vec![Content::text(message)])
    }
}

impl ServerHandler for SandboxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self.catalogue().into_iter().map(to_mcp_tool).collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        match self.dispatch(&request.name, request.arguments).await {
            Dispatch::Completed(result) => Ok(to_call_result(result)),
            Dispatch::Failed(error) => Ok(CallToolResult::error(vec![Content::text(error)])),
            Dispatch::UnknownTool(name) => Err(McpError::invalid_params(
                format!("Unknown tool: {name}"),
                None,
            )),
        }
    }
}

/// Serve `server` over stdin/stdout until the client disconnects.
pub async fn serve_stdio(server: SandboxServer) -> anyhow::Result<()> {
    tracing::info!(tools = server.tools.len(), "Serving MCP over stdio");

    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| anyhow::anyhow!("MCP handshake failed: {e}"))?;

    let reason = service.waiting().await?;
    tracing::info!(?reason, "MCP session ended");
    Ok(())
}
