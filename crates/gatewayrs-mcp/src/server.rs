//! Gateway server (component I).
//!
//! One instance per downstream session (the session controller owns
//! construction). Registers the fixed meta-tool set via `#[tool_router]`,
//! delegates resources/prompts to the aggregation layer, and — once the
//! downstream has finished its `initialize` handshake — becomes a
//! `ReverseRequestSink` the fleet can forward `model/sample`/`elicit`
//! requests through.

use crate::convert::{block_to_content, prompt_message_to_rmcp, resource_content_to_contents};
use async_trait::async_trait;
use gatewayrs_aggregation::AggregationServices;
use gatewayrs_core::{sanitize_identifier, CapabilityRecord, GatewayError, ReverseRequestSink};
use gatewayrs_fleet::FleetManager;
use gatewayrs_runtime::{self, ScriptRuntime};
use gatewayrs_upstream::{ToolSummary, UpstreamSession};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{
    CallToolResult, CreateElicitationRequestParam, CreateMessageRequestParam, GetPromptRequestParam,
    GetPromptResult, Implementation, ListPromptsResult, ListResourcesResult, PaginatedRequestParam,
    ReadResourceRequestParam, ReadResourceResult, ServerCapabilities, ServerInfo,
};
use rmcp::service::{NotificationContext, Peer, RequestContext};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListServerToolsInput {
    #[serde(rename = "luaServerName")]
    pub lua_server_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolDetailsInput {
    #[serde(rename = "luaServerName")]
    pub lua_server_name: String,
    #[serde(rename = "luaToolName")]
    pub lua_tool_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InspectToolResponseInput {
    #[serde(rename = "luaServerName")]
    pub lua_server_name: String,
    #[serde(rename = "luaToolName")]
    pub lua_tool_name: String,
    #[serde(rename = "sampleArgs", default)]
    pub sample_args: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteScriptInput {
    pub script: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct SummaryOutput {
    pub connected_servers: usize,
    pub failed_servers: usize,
    pub total_tools: usize,
    pub total_resources: usize,
    pub total_prompts: usize,
}

/// Called once, after the downstream's `initialize` handshake completes,
/// with the capabilities it advertised. The session controller uses this to
/// attach upstream peers and register reverse handlers in the right order.
pub type InitHook = Arc<dyn Fn(CapabilityRecord) + Send + Sync>;

/// Called once, when the last clone of a session's `GatewayServer` is
/// dropped, with that session's ID. Framed mode uses this to drain fleet
/// entries, aggregation caches, and the capability record for a connection
/// that disconnects without a graceful shutdown. Duplex mode has no use for
/// it — the whole process exits instead.
pub type SessionEndHook = Arc<dyn Fn(String) + Send + Sync>;

struct SessionEndGuard {
    session_id: String,
    hook: SessionEndHook,
}

impl Drop for SessionEndGuard {
    fn drop(&mut self) {
        (self.hook)(self.session_id.clone());
    }
}

#[derive(Clone)]
pub struct GatewayServer {
    session_id: String,
    fleet: Arc<FleetManager>,
    aggregation: Arc<AggregationServices>,
    runtime: Arc<ScriptRuntime>,
    peer: Arc<OnceCell<Peer<RoleServer>>>,
    init_hook: InitHook,
    end_guard: Option<Arc<SessionEndGuard>>,
    tool_router: ToolRouter<Self>,
}

impl GatewayServer {
    pub fn new(
        session_id: String,
        fleet: Arc<FleetManager>,
        aggregation: Arc<AggregationServices>,
        runtime: Arc<ScriptRuntime>,
        init_hook: InitHook,
        end_hook: Option<SessionEndHook>,
    ) -> Self {
        let end_guard = end_hook.map(|hook| {
            Arc::new(SessionEndGuard {
                session_id: session_id.clone(),
                hook,
            })
        });
        GatewayServer {
            session_id,
            fleet,
            aggregation,
            runtime,
            peer: Arc::new(OnceCell::new()),
            init_hook,
            end_guard,
            tool_router: Self::tool_router(),
        }
    }

    /// Resolve a `luaServerName` back to the original peer config key by
    /// sanitizing every connected peer's name and matching.
    fn resolve_peer(&self, lua_server_name: &str) -> Result<(String, Arc<UpstreamSession>), String> {
        self.fleet
            .list(&self.session_id)
            .into_iter()
            .find(|(peer, _)| sanitize_identifier(peer) == lua_server_name)
            .ok_or_else(|| format!("no connected server matches '{lua_server_name}'"))
    }

    fn resolve_tool(tools: &[ToolSummary], lua_tool_name: &str) -> Option<ToolSummary> {
        tools.iter().find(|t| sanitize_identifier(&t.name) == lua_tool_name).cloned()
    }
}

#[tool_router]
impl GatewayServer {
    #[tool(name = "list-servers", description = "List every configured upstream server and whether it is connected.")]
    async fn list_servers(&self) -> Result<String, String> {
        let connected = self.fleet.list(&self.session_id);
        let failed = self.fleet.failures(&self.session_id);

        let mut lines = Vec::new();
        for peer in connected.keys() {
            lines.push(format!("{} — connected", sanitize_identifier(peer)));
        }
        for (peer, reason) in &failed {
            lines.push(format!("{} — failed ({reason})", sanitize_identifier(peer)));
        }
        lines.push(format!(
            "{} connected, {} failed",
            connected.len(),
            failed.len()
        ));
        Ok(lines.join("\n"))
    }

    #[tool(name = "list-server-tools", description = "List the tools exposed by one upstream server, by its sanitized name.")]
    async fn list_server_tools(&self, input: Parameters<ListServerToolsInput>) -> Result<String, String> {
        let (_, upstream) = self.resolve_peer(&input.0.lua_server_name)?;
        let tools = upstream.list_tools().await.map_err(|e| e.redacted_message())?;

        if tools.is_empty() {
            return Ok("no tools available".to_string());
        }

        Ok(tools
            .into_iter()
            .map(|t| format!("{} — {}", sanitize_identifier(&t.name), t.description.unwrap_or_default()))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    #[tool(name = "tool-details", description = "Show the schema, required/optional fields, and an example call for one tool.")]
    async fn tool_details(&self, input: Parameters<ToolDetailsInput>) -> Result<String, String> {
        let (peer, upstream) = self.resolve_peer(&input.0.lua_server_name)?;
        let tools = upstream.list_tools().await.map_err(|e| e.redacted_message())?;
        let tool = Self::resolve_tool(&tools, &input.0.lua_tool_name)
            .ok_or_else(|| format!("no tool matches '{}' on server '{peer}'", input.0.lua_tool_name))?;

        let schema_pretty = serde_json::to_string_pretty(&tool.input_schema).unwrap_or_default();
        Ok(format!(
            "{}.{}\n{}\n\nschema:\n{}\n\nexample:\nresult({}.{}({{}}):await())",
            sanitize_identifier(&peer),
            sanitize_identifier(&tool.name),
            tool.description.unwrap_or_default(),
            schema_pretty,
            sanitize_identifier(&peer),
            sanitize_identifier(&tool.name),
        ))
    }

    #[tool(
        name = "inspect-tool-response",
        description = "Invoke a tool with sample arguments and return the exact shape the script runtime sees. This actually calls the tool."
    )]
    async fn inspect_tool_response(&self, input: Parameters<InspectToolResponseInput>) -> Result<String, String> {
        let (peer, upstream) = self.resolve_peer(&input.0.lua_server_name)?;
        let tools = upstream.list_tools().await.map_err(|e| e.redacted_message())?;
        let tool = Self::resolve_tool(&tools, &input.0.lua_tool_name)
            .ok_or_else(|| format!("no tool matches '{}' on server '{peer}'", input.0.lua_tool_name))?;

        let value = gatewayrs_runtime::inspect_call(&peer, &upstream, &tool.name, input.0.sample_args)
            .await
            .map_err(|e| e.redacted_message())?;

        Ok(format!(
            "warning: this tool was actually invoked.\n{}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        ))
    }

    #[tool(name = "summary", description = "Counts of connected/failed servers and total tools/resources/prompts.")]
    async fn summary(&self) -> Result<Json<SummaryOutput>, String> {
        let connected = self.fleet.list(&self.session_id);
        let failed = self.fleet.failures(&self.session_id);
        let tools = self.aggregation.tools.list(&self.session_id).await;
        let resources = self.aggregation.resources.list(&self.session_id).await;
        let prompts = self.aggregation.prompts.list(&self.session_id).await;

        Ok(Json(SummaryOutput {
            connected_servers: connected.len(),
            failed_servers: failed.len(),
            total_tools: tools.len(),
            total_resources: resources.len(),
            total_prompts: prompts.len(),
        }))
    }

    #[tool(name = "execute-script", description = "Run a script that can call upstream tools across servers and compose their results.")]
    async fn execute_script(&self, input: Parameters<ExecuteScriptInput>) -> Result<CallToolResult, String> {
        let peers = self.fleet.list(&self.session_id);
        let value = self
            .runtime
            .execute(&input.0.script, peers)
            .await
            .map_err(|e| e.redacted_message())?;

        Ok(script_result_to_call_result(value))
    }
}

/// `execute-script`'s three return shapes: a passthrough `ToolResult` (the
/// script returned the full envelope), a structured-content object (any
/// other JSON object or array), or a scalar rendered as text.
fn script_result_to_call_result(value: JsonValue) -> CallToolResult {
    if let JsonValue::Object(map) = &value {
        if map.contains_key("content") {
            if let Ok(tool_result) = serde_json::from_value::<gatewayrs_core::ToolResult>(value.clone()) {
                let content = tool_result.content.into_iter().map(block_to_content).collect();
                return if tool_result.is_error {
                    CallToolResult::error(content)
                } else {
                    CallToolResult::success(content)
                };
            }
        }
    }

    match &value {
        JsonValue::Null => CallToolResult::success(vec![block_to_content(gatewayrs_core::ToolResultContent::Text {
            text: "null".to_string(),
        })]),
        JsonValue::String(s) => CallToolResult::success(vec![block_to_content(gatewayrs_core::ToolResultContent::Text {
            text: s.clone(),
        })]),
        JsonValue::Bool(_) | JsonValue::Number(_) => {
            CallToolResult::success(vec![block_to_content(gatewayrs_core::ToolResultContent::Text {
                text: value.to_string(),
            })])
        }
        JsonValue::Object(_) | JsonValue::Array(_) => {
            let text = serde_json::to_string_pretty(&value).unwrap_or_default();
            let mut result = CallToolResult::success(vec![block_to_content(gatewayrs_core::ToolResultContent::Text { text })]);
            result.structured_content = Some(value);
            result
        }
    }
}

#[tool_handler]
impl ServerHandler for GatewayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "mcp-gateway".to_string(),
                title: Some("Protocol gateway".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
            instructions: Some(
                "Aggregates upstream MCP servers behind one endpoint. Use list-servers and \
                 list-server-tools to discover what's available, tool-details for a schema, \
                 and execute-script to call one or more tools and compose their results."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    async fn on_initialized(&self, context: NotificationContext<RoleServer>) {
        let _ = self.peer.set(context.peer.clone());

        let caps = context
            .peer
            .peer_info()
            .map(|info| CapabilityRecord {
                sampling: info.capabilities.sampling.is_some(),
                elicitation: info.capabilities.elicitation.is_some(),
            })
            .unwrap_or_default();

        debug!(session = %self.session_id, ?caps, "downstream initialized");
        (self.init_hook)(caps);
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = self
            .aggregation
            .resources
            .list(&self.session_id)
            .await
            .into_iter()
            .map(|n| n.item)
            .collect();

        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let content = self
            .aggregation
            .resources
            .read(&self.session_id, &request.uri)
            .await
            .map_err(|e| McpError::invalid_request(e.redacted_message(), None))?;

        Ok(ReadResourceResult {
            contents: vec![resource_content_to_contents(content)],
        })
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        let prompts = self
            .aggregation
            .prompts
            .list(&self.session_id)
            .await
            .into_iter()
            .map(|n| n.item)
            .collect();

        Ok(ListPromptsResult {
            prompts,
            next_cursor: None,
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let messages = self
            .aggregation
            .prompts
            .get(&self.session_id, &request.name, request.arguments)
            .await
            .map_err(|e| McpError::invalid_request(e.redacted_message(), None))?;

        Ok(GetPromptResult {
            description: None,
            messages: messages.into_iter().map(prompt_message_to_rmcp).collect(),
        })
    }
}

#[async_trait]
impl ReverseRequestSink for GatewayServer {
    async fn forward_sampling(&self, _session: &str, params: JsonValue) -> Result<JsonValue, GatewayError> {
        let peer = self
            .peer
            .get()
            .ok_or_else(|| GatewayError::ReverseForwardFailed("downstream not yet initialized".to_string()))?;

        let request: CreateMessageRequestParam =
            serde_json::from_value(params).map_err(|e| GatewayError::ReverseForwardFailed(e.to_string()))?;

        let result = peer
            .create_message(request)
            .await
            .map_err(|e| GatewayError::ReverseForwardFailed(e.to_string()))?;

        serde_json::to_value(result).map_err(|e| GatewayError::ReverseForwardFailed(e.to_string()))
    }

    async fn forward_elicitation(&self, _session: &str, params: JsonValue) -> Result<JsonValue, GatewayError> {
        let peer = self
            .peer
            .get()
            .ok_or_else(|| GatewayError::ReverseForwardFailed("downstream not yet initialized".to_string()))?;

        let request: CreateElicitationRequestParam =
            serde_json::from_value(params).map_err(|e| GatewayError::ReverseForwardFailed(e.to_string()))?;

        let result = peer
            .create_elicitation(request)
            .await
            .map_err(|e| GatewayError::ReverseForwardFailed(e.to_string()))?;

        serde_json::to_value(result).map_err(|e| GatewayError::ReverseForwardFailed(e.to_string()))
    }
}
