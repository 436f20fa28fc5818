//! Resources aggregation service.

use futures::future::join_all;
use gatewayrs_core::{
    encode_resource_uri, Cache, DownstreamSessionId, GatewayError, Namespaced, ResourceContent,
};
use gatewayrs_fleet::FleetManager;
use rmcp::model::Resource;
use std::sync::Arc;
use tracing::warn;

pub struct ResourcesAggregationService {
    fleet: Arc<FleetManager>,
    cache: Cache<DownstreamSessionId, Vec<Namespaced<Resource>>>,
}

impl ResourcesAggregationService {
    pub fn new(fleet: Arc<FleetManager>) -> Self {
        ResourcesAggregationService {
            fleet,
            cache: Cache::new(),
        }
    }

    pub async fn list(&self, session: &str) -> Vec<Namespaced<Resource>> {
        if let Some(cached) = self.cache.get(&session.to_string()) {
            return cached;
        }

        let peers = self.fleet.list(session);
        let fetches = peers.into_iter().map(|(peer, upstream)| async move {
            match upstream.list_resources().await {
                Ok(resources) => resources
                    .into_iter()
                    .map(|mut r| {
                        let namespaced_id = encode_resource_uri(&peer, &r.uri);
                        r.uri = namespaced_id.clone();
                        Namespaced {
                            peer: peer.clone(),
                            namespaced_id,
                            item: r,
                        }
                    })
                    .collect::<Vec<_>>(),
                Err(e) => {
                    if !e.to_string().contains("does not support resources/prompts") {
                        warn!(%peer, error = %e, "resources/list failed for peer, treating as empty");
                    }
                    Vec::new()
                }
            }
        });

        let union: Vec<Namespaced<Resource>> = join_all(fetches).await.into_iter().flatten().collect();
        self.cache.put(session.to_string(), union.clone());
        union
    }

    pub async fn read(&self, session: &str, namespaced_uri: &str) -> Result<ResourceContent, GatewayError> {
        let (peer, original) = gatewayrs_core::decode_resource_uri(namespaced_uri)?;
        let upstream = self.fleet.get(&peer, session)?;

        let mut content = upstream.read_resource(&original).await?;
        content.uri = encode_resource_uri(&peer, &content.uri);
        Ok(content)
    }

    pub fn invalidate(&self, session: &str) {
        self.cache.invalidate(&session.to_string());
    }
}
