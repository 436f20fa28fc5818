//! Session controller (component J): creates one gateway + fleet scope per
//! downstream session and drives the two transport modes from §4.5.
//!
//! The fleet and aggregation services are process-wide singletons keyed
//! internally by session ID; what's per-session is the `GatewayServer`
//! instance and its capability record. Duplex mode attaches upstream peers
//! immediately, before any downstream traffic is possible. Framed mode
//! defers attachment to the gateway's `on_initialized` hook, so advertised
//! capabilities always match what the connecting client actually declared.

use crate::capability_store::CapabilityStore;
use futures::future::join_all;
use gatewayrs_aggregation::AggregationServices;
use gatewayrs_core::{CapabilityRecord, GatewayConfig, GatewayError, ReverseRequestSink, UpstreamPeerConfig};
use gatewayrs_fleet::FleetManager;
use gatewayrs_mcp::{GatewayServer, InitHook, SessionEndHook};
use gatewayrs_runtime::ScriptRuntime;
use std::sync::{Arc, Weak};
use tokio::sync::OnceCell;
use tracing::warn;

/// The session ID used in duplex (single-session) transport mode.
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Clone)]
pub struct SessionController {
    config: Arc<GatewayConfig>,
    fleet: Arc<FleetManager>,
    aggregation: Arc<AggregationServices>,
    runtime: Arc<ScriptRuntime>,
    capabilities: Arc<CapabilityStore>,
}

impl SessionController {
    pub fn new(config: GatewayConfig) -> Self {
        let fleet = Arc::new(FleetManager::new());
        let aggregation = Arc::new(AggregationServices::new(fleet.clone()));
        SessionController {
            config: Arc::new(config),
            fleet,
            aggregation,
            runtime: Arc::new(ScriptRuntime::new()),
            capabilities: Arc::new(CapabilityStore::new()),
        }
    }

    pub fn fleet(&self) -> Arc<FleetManager> {
        self.fleet.clone()
    }

    pub fn aggregation(&self) -> Arc<AggregationServices> {
        self.aggregation.clone()
    }

    pub fn config_snapshot(&self) -> Arc<GatewayConfig> {
        self.config.clone()
    }

    pub fn capabilities(&self) -> Arc<CapabilityStore> {
        self.capabilities.clone()
    }

    /// Duplex mode: one gateway for the process lifetime, upstreams attached
    /// before the caller starts serving downstream traffic.
    pub async fn duplex_gateway(&self) -> Arc<GatewayServer> {
        let gateway = self.new_gateway(DEFAULT_SESSION_ID.to_string(), None);
        let caps = CapabilityRecord {
            sampling: true,
            elicitation: true,
        };
        self.capabilities.set(DEFAULT_SESSION_ID, caps.clone());
        self.attach_upstreams(DEFAULT_SESSION_ID, caps, gateway.clone()).await;
        gateway
    }

    /// Framed mode: called once per new downstream session by the framing
    /// layer's session factory. Upstream attachment is deferred until the
    /// gateway's `on_initialized` hook fires. `end_hook` fires once the
    /// transport drops every clone of the returned `GatewayServer`, i.e.
    /// when that HTTP session ends.
    pub fn framed_gateway(&self, session_id: String, end_hook: SessionEndHook) -> Arc<GatewayServer> {
        self.new_gateway(session_id, Some(end_hook))
    }

    fn new_gateway(&self, session_id: String, end_hook: Option<SessionEndHook>) -> Arc<GatewayServer> {
        let controller = self.clone();
        let sid = session_id.clone();
        // Holds a `Weak` rather than a strong `Arc` so the init hook (stored
        // inside `GatewayServer` itself) never keeps the gateway it belongs
        // to alive forever.
        let gateway_cell: Arc<OnceCell<Weak<GatewayServer>>> = Arc::new(OnceCell::new());
        let gateway_cell_for_hook = gateway_cell.clone();

        let init_hook: InitHook = Arc::new(move |caps: CapabilityRecord| {
            let controller = controller.clone();
            let sid = sid.clone();
            let gateway_cell = gateway_cell_for_hook.clone();
            tokio::spawn(async move {
                controller.capabilities.set(&sid, caps.clone());
                match gateway_cell.get().and_then(Weak::upgrade) {
                    Some(gateway) => controller.attach_upstreams(&sid, caps, gateway).await,
                    None => warn!(session = %sid, "on_initialized fired after the gateway was dropped"),
                }
            });
        });

        let gateway = Arc::new(GatewayServer::new(
            session_id,
            self.fleet.clone(),
            self.aggregation.clone(),
            self.runtime.clone(),
            init_hook,
            end_hook,
        ));
        let _ = gateway_cell.set(Arc::downgrade(&gateway));
        gateway
    }

    /// Attaches every configured upstream peer in parallel; one peer's
    /// failure never delays or blocks another's attach.
    async fn attach_upstreams(&self, session_id: &str, caps: CapabilityRecord, sink: Arc<dyn ReverseRequestSink>) {
        let attaches = self.config.mcp_clients.iter().map(|(peer, peer_config)| {
            let fleet = self.fleet.clone();
            let caps = caps.clone();
            let sink = sink.clone();
            let session_id = session_id.to_string();
            let peer = peer.clone();
            async move {
                let allowlist = peer_config.allowlist();
                let result: Result<(), GatewayError> = match peer_config {
                    UpstreamPeerConfig::Streamed { url, headers, .. } => {
                        fleet
                            .attach_streamed(peer.clone(), url, session_id.clone(), headers.clone(), allowlist, Some(caps), sink)
                            .await
                    }
                    UpstreamPeerConfig::Child { command, args, env, .. } => {
                        fleet
                            .attach_child(peer.clone(), command, session_id.clone(), args.clone(), env.clone(), allowlist, Some(caps), sink)
                            .await
                    }
                };

                if let Err(e) = result {
                    warn!(%peer, session = %session_id, error = %e, "failed to attach upstream peer");
                }
            }
        });

        join_all(attaches).await;
    }
}
