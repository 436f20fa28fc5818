//! Shared primitives for the protocol gateway: data model, identifier
//! sanitizer, resource-URI codec, and cache primitive.

pub mod cache;
pub mod config;
pub mod error;
pub mod hooks;
pub mod ident;
pub mod model;
pub mod uri;

pub use cache::Cache;
pub use config::{GatewayConfig, TransportMode};
pub use error::{GatewayError, Result};
pub use hooks::{ListChangeKind, ListChangeNotifier, ReverseRequestSink};
pub use ident::sanitize_identifier;
pub use model::{
    rewrite_content_uris, CapabilityRecord, DownstreamSessionId, Namespaced, PeerName,
    PromptMessage, ResourceContent, ToolResult, ToolResultContent, UpstreamPeerConfig,
};
pub use uri::{decode_prompt_name, decode_resource_uri, encode_prompt_name, encode_resource_uri};
