//! Cross-crate abstraction points that keep the construction graph acyclic.
//!
//! The fleet manager must notify aggregation services of list changes and
//! forward reverse requests through the gateway without depending on either
//! crate directly. Both sides depend on these traits instead: the gateway
//! and aggregation crates implement them, the fleet crate only calls them.

use crate::error::GatewayError;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListChangeKind {
    Tools,
    Resources,
    Prompts,
}

/// Implemented by the gateway to forward a reverse request (`model/sample`
/// or `elicit`) to the downstream consumer of one session.
#[async_trait]
pub trait ReverseRequestSink: Send + Sync {
    async fn forward_sampling(
        &self,
        session: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError>;

    async fn forward_elicitation(
        &self,
        session: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError>;
}

/// Implemented by the fleet manager so the upstream crate's client-side
/// reverse handler can report a peer's `tools/resources/prompts`
/// list-changed notification without depending on the fleet crate directly.
#[async_trait]
pub trait ListChangeNotifier: Send + Sync {
    async fn notify_list_changed(&self, kind: ListChangeKind, peer: &str, session: &str);
}
