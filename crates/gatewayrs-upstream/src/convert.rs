//! Conversions between `rmcp`'s wire-level content types and the shared
//! data model in `gatewayrs-core`.

use gatewayrs_core::{GatewayError, PromptMessage, ResourceContent, ToolResultContent};
use rmcp::model::{Content, PromptMessageContent, RawContent, ResourceContents};

pub fn raw_content_to_block(content: Content) -> Result<ToolResultContent, GatewayError> {
    match content.raw {
        RawContent::Text(t) => Ok(ToolResultContent::Text { text: t.text }),
        RawContent::Image(i) => Ok(ToolResultContent::Image {
            data: i.data,
            mime_type: i.mime_type,
        }),
        RawContent::Resource(r) => Ok(ToolResultContent::EmbeddedResource {
            resource: raw_resource_to_content(r.resource),
        }),
        RawContent::ResourceLink(l) => Ok(ToolResultContent::ResourceLink {
            uri: l.uri,
            name: l.name,
            description: l.description,
        }),
        other => Err(GatewayError::UpstreamCallFailed(format!(
            "unsupported content block: {other:?}"
        ))),
    }
}

pub fn raw_resource_to_content(resource: ResourceContents) -> ResourceContent {
    match resource {
        ResourceContents::TextResourceContents {
            uri,
            mime_type,
            text,
        } => ResourceContent {
            uri,
            mime_type,
            text: Some(text),
            blob: None,
        },
        ResourceContents::BlobResourceContents {
            uri,
            mime_type,
            blob,
        } => ResourceContent {
            uri,
            mime_type,
            text: None,
            blob: Some(blob),
        },
    }
}

pub fn raw_prompt_message_to_message(
    message: rmcp::model::PromptMessage,
) -> PromptMessage {
    let role = match message.role {
        rmcp::model::PromptMessageRole::User => "user".to_string(),
        rmcp::model::PromptMessageRole::Assistant => "assistant".to_string(),
    };

    let content = match message.content {
        PromptMessageContent::Text { text } => vec![ToolResultContent::Text { text }],
        PromptMessageContent::Image { image } => vec![ToolResultContent::Image {
            data: image.data,
            mime_type: image.mime_type,
        }],
        PromptMessageContent::Resource { resource } => vec![ToolResultContent::EmbeddedResource {
            resource: raw_resource_to_content(resource.resource),
        }],
    };

    PromptMessage { role, content }
}
