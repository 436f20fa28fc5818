//! Data model (§3): the types shared across every component.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Opaque label from configuration, unique per downstream session.
pub type PeerName = String;

/// Assigned by the framing layer at session start. `"default"` in duplex
/// single-session mode.
pub type DownstreamSessionId = String;

/// Static configuration for one upstream peer, as parsed from `mcpClients`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamPeerConfig {
    Streamed {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default, rename = "allowedTools")]
        allowed_tools: Option<Vec<String>>,
    },
    Child {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default, rename = "allowedTools")]
        allowed_tools: Option<Vec<String>>,
    },
}

impl UpstreamPeerConfig {
    /// `None` means "all tools allowed"; `Some(empty set)` means "none".
    pub fn allowlist(&self) -> Option<HashSet<String>> {
        match self {
            UpstreamPeerConfig::Streamed { allowed_tools, .. }
            | UpstreamPeerConfig::Child { allowed_tools, .. } => allowed_tools
                .as_ref()
                .map(|tools| tools.iter().cloned().collect()),
        }
    }
}

/// Booleans describing which reverse-request kinds the downstream consumer
/// accepts. Bound to one `DownstreamSessionId`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub sampling: bool,
    pub elicitation: bool,
}

/// One content block of a tool result, resource read, or prompt message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolResultContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    #[serde(rename = "resource")]
    EmbeddedResource { resource: ResourceContent },
    #[serde(rename = "resource_link")]
    ResourceLink {
        uri: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// The normalized shape of any upstream tool call, after resource URIs have
/// been rewritten into namespaced form.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        ToolResult {
            content: vec![ToolResultContent::Text { text: text.into() }],
            structured_content: None,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        ToolResult {
            content: vec![ToolResultContent::Text { text: text.into() }],
            structured_content: None,
            is_error: true,
        }
    }
}

/// Recursively rewrite resource URIs found in content blocks into namespaced
/// form for the given peer. Used by both the aggregation read path and the
/// scripting runtime's result normalization.
pub fn rewrite_content_uris(
    content: &mut [ToolResultContent],
    peer: &str,
    encode: impl Fn(&str, &str) -> String + Copy,
) {
    for block in content.iter_mut() {
        match block {
            ToolResultContent::EmbeddedResource { resource } => {
                resource.uri = encode(peer, &resource.uri);
            }
            ToolResultContent::ResourceLink { uri, .. } => {
                *uri = encode(peer, uri);
            }
            _ => {}
        }
    }
}

/// One message returned by a prompt, after resource URIs embedded in its
/// content blocks have been rewritten into namespaced form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: Vec<ToolResultContent>,
}

/// A single entry in an aggregated (union) list: the caller-facing
/// namespaced identifier plus the original peer-local item.
#[derive(Debug, Clone)]
pub struct Namespaced<T> {
    pub peer: PeerName,
    pub namespaced_id: String,
    pub item: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::encode_resource_uri;

    #[test]
    fn allowlist_absent_is_none() {
        let cfg = UpstreamPeerConfig::Streamed {
            url: "http://x".into(),
            headers: HashMap::new(),
            allowed_tools: None,
        };
        assert!(cfg.allowlist().is_none());
    }

    #[test]
    fn allowlist_empty_blocks_all() {
        let cfg = UpstreamPeerConfig::Child {
            command: "x".into(),
            args: vec![],
            env: HashMap::new(),
            allowed_tools: Some(vec![]),
        };
        assert_eq!(cfg.allowlist(), Some(HashSet::new()));
    }

    #[test]
    fn rewrite_embedded_resource_uri() {
        let mut content = vec![ToolResultContent::EmbeddedResource {
            resource: ResourceContent {
                uri: "file:///test.json".into(),
                mime_type: None,
                text: None,
                blob: None,
            },
        }];
        rewrite_content_uris(&mut content, "data", encode_resource_uri);
        match &content[0] {
            ToolResultContent::EmbeddedResource { resource } => {
                assert_eq!(resource.uri, "agg://data/file:///test.json");
            }
            _ => panic!("expected embedded resource"),
        }
    }
}
