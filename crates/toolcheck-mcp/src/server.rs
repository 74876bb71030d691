//! MCP server implementation for toolcheck.

use crate::tools::{ListSpecsParams, RunSmokeTestsParams, render_listing};
use rmcp::ErrorData as McpError;
use rmcp::ServiceExt;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router};
use std::sync::Arc;
use toolcheck_core::Diagnostic;
use tracing::{info, warn};

/// Serves smoke-test diagnostics over MCP.
#[derive(Clone)]
pub struct ToolcheckMcpServer {
    diagnostic: Arc<Diagnostic>,
    tool_router: ToolRouter<Self>,
}

impl ToolcheckMcpServer {
    pub fn new(diagnostic: Arc<Diagnostic>) -> Self {
        Self {
            diagnostic,
            tool_router: Self::tool_router(),
        }
    }
}

fn text_result(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn error_result(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(text)]))
}

#[tool_router]
impl ToolcheckMcpServer {
    /// Run smoke tests against the tool-server fleet.
    #[tool(description = "Run smoke tests against the configured tool-servers and report \
        what is misconfigured, unreachable or broken, with a fix suggestion for each failure. \
        Returns a human-readable summary followed by the full JSON report. Test failures are \
        reported as data, not as tool errors. The 'health' level invokes real tools and may \
        consume API credits.")]
    async fn run_smoke_tests(
        &self,
        Parameters(params): Parameters<RunSmokeTestsParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = match params.into_request() {
            Ok(request) => request,
            Err(err) => return error_result(err),
        };

        let response = self.diagnostic.run(&request).await;
        let structured = match serde_json::to_string_pretty(&response.structured) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to encode smoke test report");
                return text_result(response.text);
            }
        };

        Ok(CallToolResult::success(vec![
            Content::text(response.text),
            Content::text(structured),
        ]))
    }

    /// List servers and their declared checks.
    #[tool(description = "List the active tool-servers and the smoke test checks declared \
        for each (config, connectivity, health counts and any cost warnings). Also reports \
        servers whose test specification failed to load. Read-only.")]
    async fn list_smoke_specs(
        &self,
        Parameters(params): Parameters<ListSpecsParams>,
    ) -> Result<CallToolResult, McpError> {
        let servers = params
            .servers
            .filter(|servers| !servers.is_empty())
            .unwrap_or_else(|| self.diagnostic.active_servers());
        let summaries: Vec<_> = servers
            .iter()
            .map(|server| self.diagnostic.store().summary(server))
            .collect();
        text_result(render_listing(&summaries))
    }
}

#[tool_handler]
impl ServerHandler for ToolcheckMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.instructions = Some(
            "toolcheck diagnoses the tool-servers this agent depends on. \
             Call list_smoke_specs to see what is covered, then run_smoke_tests \
             (default level 'connectivity') when a tool misbehaves. Each failure \
             carries a fix suggestion."
                .to_string(),
        );
        info
    }
}

/// Serves the MCP server over stdio until the client disconnects.
pub async fn serve_stdio(diagnostic: Arc<Diagnostic>) -> anyhow::Result<()> {
    info!("Starting toolcheck MCP server on stdio");

    let server = ToolcheckMcpServer::new(diagnostic);
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;
    service.waiting().await?;

    info!("toolcheck MCP server stopped");
    Ok(())
}
