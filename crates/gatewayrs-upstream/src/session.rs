//! Upstream session (component D).
//!
//! Wraps one peer connection: caches `tools/resources/prompts` lists,
//! applies the per-peer tool allowlist, and exposes the operations the
//! fleet and aggregation services need. List-change notifications are not
//! wired here directly — the fleet owns the subscription and calls
//! `invalidate_*` on this session when a notification arrives, then fans
//! the event out to its own registered handlers.

use crate::reverse::ReverseHandler;
use gatewayrs_core::{GatewayError, PeerName, PromptMessage, ResourceContent, ToolResult};
use rmcp::model::{
    CallToolRequestParam, GetPromptRequestParam, Prompt, ReadResourceRequestParam, Resource, Tool,
};
use rmcp::service::RunningService;
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use std::collections::HashMap;
use std::collections::HashSet;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A short-hand description of one tool, used by discovery meta-tools and
/// the script runtime's peer injection without requiring the full `Tool`
/// schema to be re-derived at each call site.
#[derive(Debug, Clone)]
pub struct ToolSummary {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

pub struct UpstreamSession {
    pub peer_name: PeerName,
    allowlist: Option<HashSet<String>>,
    client: RunningService<RoleClient, ReverseHandler>,
    tools: RwLock<Option<Vec<Tool>>>,
    resources: RwLock<Option<Vec<Resource>>>,
    prompts: RwLock<Option<Vec<Prompt>>>,
}

impl UpstreamSession {
    pub async fn connect_child(
        peer_name: PeerName,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        allowlist: Option<HashSet<String>>,
        reverse_handler: ReverseHandler,
    ) -> Result<Self, GatewayError> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        for (k, v) in env {
            cmd.env(k, v);
        }

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| GatewayError::PeerConnectFailed(format!("{peer_name}: {e}")))?;

        let client = reverse_handler
            .serve(transport)
            .await
            .map_err(|e| GatewayError::PeerConnectFailed(format!("{peer_name}: {e}")))?;

        debug!(peer = %peer_name, "attached child-process upstream");

        Ok(UpstreamSession {
            peer_name,
            allowlist,
            client,
            tools: RwLock::new(None),
            resources: RwLock::new(None),
            prompts: RwLock::new(None),
        })
    }

    pub async fn connect_streamed(
        peer_name: PeerName,
        url: &str,
        headers: &HashMap<String, String>,
        allowlist: Option<HashSet<String>>,
        reverse_handler: ReverseHandler,
    ) -> Result<Self, GatewayError> {
        let transport = StreamableHttpClientTransport::from_uri_with_headers(url, headers.clone())
            .map_err(|e| GatewayError::PeerConnectFailed(format!("{peer_name}: {e}")))?;

        let client = reverse_handler
            .serve(transport)
            .await
            .map_err(|e| GatewayError::PeerConnectFailed(format!("{peer_name}: {e}")))?;

        debug!(peer = %peer_name, %url, "attached streamed upstream");

        Ok(UpstreamSession {
            peer_name,
            allowlist,
            client,
            tools: RwLock::new(None),
            resources: RwLock::new(None),
            prompts: RwLock::new(None),
        })
    }

    fn is_allowed(&self, tool_name: &str) -> bool {
        match &self.allowlist {
            None => true,
            Some(set) => set.contains(tool_name),
        }
    }

    /// The list of tools visible through the allowlist, fetching and caching
    /// the upstream's full list on first reference.
    pub async fn list_tools(&self) -> Result<Vec<ToolSummary>, GatewayError> {
        if let Some(cached) = self.tools.read().await.as_ref() {
            return Ok(self.filter_tools(cached));
        }

        let result = self
            .client
            .list_tools(Default::default())
            .await
            .map_err(|e| GatewayError::UpstreamCallFailed(format!("{}: {e}", self.peer_name)))?;

        let tools = result.tools;
        let filtered = self.filter_tools(&tools);
        *self.tools.write().await = Some(tools);
        Ok(filtered)
    }

    fn filter_tools(&self, tools: &[Tool]) -> Vec<ToolSummary> {
        tools
            .iter()
            .filter(|t| self.is_allowed(t.name.as_ref()))
            .map(|t| ToolSummary {
                name: t.name.to_string(),
                description: t.description.as_ref().map(|d| d.to_string()),
                input_schema: serde_json::to_value(&t.input_schema).unwrap_or(serde_json::Value::Null),
            })
            .collect()
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, GatewayError> {
        if let Some(cached) = self.resources.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let result = self
            .client
            .list_resources(Default::default())
            .await
            .map_err(|e| GatewayError::UpstreamCallFailed(format!("{}: {e}", self.peer_name)))?;
        *self.resources.write().await = Some(result.resources.clone());
        Ok(result.resources)
    }

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>, GatewayError> {
        if let Some(cached) = self.prompts.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let result = self
            .client
            .list_prompts(Default::default())
            .await
            .map_err(|e| GatewayError::UpstreamCallFailed(format!("{}: {e}", self.peer_name)))?;
        *self.prompts.write().await = Some(result.prompts.clone());
        Ok(result.prompts)
    }

    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, GatewayError> {
        if !self.is_allowed(tool_name) {
            return Err(GatewayError::PeerNotFound(format!(
                "{}: tool '{tool_name}' is not in the allowlist",
                self.peer_name
            )));
        }

        let args_map = match arguments {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                Some(map)
            }
        };

        let result = self
            .client
            .call_tool(CallToolRequestParam {
                name: tool_name.to_string().into(),
                arguments: args_map,
            })
            .await
            .map_err(|e| GatewayError::UpstreamCallFailed(format!("{}: {e}", self.peer_name)))?;

        Ok(ToolResult {
            content: result
                .content
                .into_iter()
                .filter_map(|block| super::convert::raw_content_to_block(block).ok())
                .collect(),
            structured_content: result.structured_content,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContent, GatewayError> {
        let result = self
            .client
            .read_resource(ReadResourceRequestParam { uri: uri.to_string() })
            .await
            .map_err(|e| GatewayError::UpstreamCallFailed(format!("{}: {e}", self.peer_name)))?;

        result
            .contents
            .into_iter()
            .next()
            .map(super::convert::raw_resource_to_content)
            .ok_or_else(|| {
                GatewayError::UpstreamCallFailed(format!(
                    "{}: resource '{uri}' returned no contents",
                    self.peer_name
                ))
            })
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Vec<PromptMessage>, GatewayError> {
        let result = self
            .client
            .get_prompt(GetPromptRequestParam {
                name: name.to_string(),
                arguments,
            })
            .await
            .map_err(|e| GatewayError::UpstreamCallFailed(format!("{}: {e}", self.peer_name)))?;

        Ok(result
            .messages
            .into_iter()
            .map(super::convert::raw_prompt_message_to_message)
            .collect())
    }

    pub async fn invalidate_tools(&self) {
        *self.tools.write().await = None;
    }

    pub async fn invalidate_resources(&self) {
        *self.resources.write().await = None;
    }

    pub async fn invalidate_prompts(&self) {
        *self.prompts.write().await = None;
    }

    pub async fn close(self) {
        if let Err(e) = self.client.cancel().await {
            warn!(peer = %self.peer_name, error = %e, "error cancelling upstream session");
        }
    }
}
