//! Prompts aggregation service.

use futures::future::join_all;
use gatewayrs_core::{
    encode_prompt_name, rewrite_content_uris, Cache, DownstreamSessionId, GatewayError, Namespaced,
    PromptMessage,
};
use gatewayrs_fleet::FleetManager;
use rmcp::model::Prompt;
use std::sync::Arc;
use tracing::warn;

pub struct PromptsAggregationService {
    fleet: Arc<FleetManager>,
    cache: Cache<DownstreamSessionId, Vec<Namespaced<Prompt>>>,
}

impl PromptsAggregationService {
    pub fn new(fleet: Arc<FleetManager>) -> Self {
        PromptsAggregationService {
            fleet,
            cache: Cache::new(),
        }
    }

    pub async fn list(&self, session: &str) -> Vec<Namespaced<Prompt>> {
        if let Some(cached) = self.cache.get(&session.to_string()) {
            return cached;
        }

        let peers = self.fleet.list(session);
        let fetches = peers.into_iter().map(|(peer, upstream)| async move {
            match upstream.list_prompts().await {
                Ok(prompts) => prompts
                    .into_iter()
                    .map(|mut p| {
                        let namespaced_id = encode_prompt_name(&peer, &p.name);
                        p.name = namespaced_id.clone();
                        Namespaced {
                            peer: peer.clone(),
                            namespaced_id,
                            item: p,
                        }
                    })
                    .collect::<Vec<_>>(),
                Err(e) => {
                    if !e.to_string().contains("does not support resources/prompts") {
                        warn!(%peer, error = %e, "prompts/list failed for peer, treating as empty");
                    }
                    Vec::new()
                }
            }
        });

        let union: Vec<Namespaced<Prompt>> = join_all(fetches).await.into_iter().flatten().collect();
        self.cache.put(session.to_string(), union.clone());
        union
    }

    pub async fn get(
        &self,
        session: &str,
        namespaced_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Vec<PromptMessage>, GatewayError> {
        let (peer, original) = gatewayrs_core::decode_prompt_name(namespaced_name)?;
        let upstream = self.fleet.get(&peer, session)?;

        let mut messages = upstream.get_prompt(&original, arguments).await?;
        for message in &mut messages {
            rewrite_content_uris(&mut message.content, &peer, gatewayrs_core::encode_resource_uri);
        }
        Ok(messages)
    }

    pub fn invalidate(&self, session: &str) {
        self.cache.invalidate(&session.to_string());
    }
}
