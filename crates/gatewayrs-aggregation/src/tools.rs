//! Tools aggregation service.
//!
//! Unlike resources/prompts, this union is never the downstream-facing
//! `listTools` result (that surface is the static meta-tool set, §4.3). It
//! backs the `list-server-tools`/`tool-details` meta-tools and the script
//! runtime's peer injection, both of which need the full per-peer tool set.

use futures::future::join_all;
use gatewayrs_core::{Cache, DownstreamSessionId, Namespaced};
use gatewayrs_fleet::FleetManager;
use gatewayrs_upstream::ToolSummary;
use std::sync::Arc;
use tracing::warn;

pub struct ToolsAggregationService {
    fleet: Arc<FleetManager>,
    cache: Cache<DownstreamSessionId, Vec<Namespaced<ToolSummary>>>,
}

impl ToolsAggregationService {
    pub fn new(fleet: Arc<FleetManager>) -> Self {
        ToolsAggregationService {
            fleet,
            cache: Cache::new(),
        }
    }

    pub async fn list(&self, session: &str) -> Vec<Namespaced<ToolSummary>> {
        if let Some(cached) = self.cache.get(&session.to_string()) {
            return cached;
        }

        let peers = self.fleet.list(session);
        let fetches = peers.into_iter().map(|(peer, upstream)| async move {
            match upstream.list_tools().await {
                Ok(tools) => tools
                    .into_iter()
                    .map(|t| Namespaced {
                        peer: peer.clone(),
                        namespaced_id: format!("{peer}/{}", t.name),
                        item: t,
                    })
                    .collect::<Vec<_>>(),
                Err(e) => {
                    warn!(%peer, error = %e, "tools/list failed for peer, treating as empty");
                    Vec::new()
                }
            }
        });

        let union: Vec<Namespaced<ToolSummary>> = join_all(fetches).await.into_iter().flatten().collect();
        self.cache.put(session.to_string(), union.clone());
        union
    }

    pub async fn for_peer(&self, session: &str, peer: &str) -> Vec<ToolSummary> {
        self.list(session)
            .await
            .into_iter()
            .filter(|n| n.peer == peer)
            .map(|n| n.item)
            .collect()
    }

    pub fn invalidate(&self, session: &str) {
        self.cache.invalidate(&session.to_string());
    }
}
