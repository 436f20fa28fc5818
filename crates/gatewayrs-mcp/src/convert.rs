//! Conversions from the shared data model back to `rmcp`'s wire-level
//! content types, for responses the gateway sends downstream. The inverse
//! direction lives in `gatewayrs-upstream::convert`.

use gatewayrs_core::{PromptMessage, ResourceContent, ToolResultContent};
use rmcp::model::{
    Content, PromptMessageContent, PromptMessageRole, RawContent, RawEmbeddedResource,
    RawImageContent, RawResourceLink, ResourceContents,
};

/// A content block as a downstream-facing `Content`. Embedded resources and
/// resource links are preserved as their structured `rmcp` variant, the same
/// way `gatewayrs-upstream::convert` preserves them coming in — a consumer
/// that only understands plain text still renders these fine, since
/// `RawEmbeddedResource`/`RawResourceLink` carry their own text fallback.
pub fn block_to_content(block: ToolResultContent) -> Content {
    match block {
        ToolResultContent::Text { text } => Content::text(text),
        ToolResultContent::Image { data, mime_type } => Content::image(data, mime_type),
        ToolResultContent::EmbeddedResource { resource } => RawContent::Resource(RawEmbeddedResource {
            resource: resource_content_to_contents(resource),
        })
        .into(),
        ToolResultContent::ResourceLink { uri, name, description } => RawContent::ResourceLink(RawResourceLink {
            uri,
            name,
            description,
            ..Default::default()
        })
        .into(),
    }
}

pub fn resource_content_to_contents(content: ResourceContent) -> ResourceContents {
    match content.text {
        Some(text) => ResourceContents::TextResourceContents {
            uri: content.uri,
            mime_type: content.mime_type,
            text,
        },
        None => ResourceContents::BlobResourceContents {
            uri: content.uri,
            mime_type: content.mime_type,
            blob: content.blob.unwrap_or_default(),
        },
    }
}

pub fn prompt_message_to_rmcp(message: PromptMessage) -> rmcp::model::PromptMessage {
    let role = match message.role.as_str() {
        "assistant" => PromptMessageRole::Assistant,
        _ => PromptMessageRole::User,
    };

    let content = message
        .content
        .into_iter()
        .next()
        .map(block_to_prompt_content)
        .unwrap_or(PromptMessageContent::Text { text: String::new() });

    rmcp::model::PromptMessage { role, content }
}

fn block_to_prompt_content(block: ToolResultContent) -> PromptMessageContent {
    match block {
        ToolResultContent::Text { text } => PromptMessageContent::Text { text },
        ToolResultContent::Image { data, mime_type } => PromptMessageContent::Image {
            image: RawImageContent { data, mime_type },
        },
        ToolResultContent::EmbeddedResource { resource } => PromptMessageContent::Resource {
            resource: RawEmbeddedResource {
                resource: resource_content_to_contents(resource),
            },
        },
        // PromptMessageContent has no resource-link variant, unlike Content.
        ToolResultContent::ResourceLink { uri, name, description } => PromptMessageContent::Text {
            text: format!(
                "Resource link: {name} ({uri}){}",
                description.map(|d| format!(" — {d}")).unwrap_or_default()
            ),
        },
    }
}
