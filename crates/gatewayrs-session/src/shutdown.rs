//! Shutdown coordinator (component K): ordered drain of one session, or of
//! every session at process exit.

use crate::capability_store::CapabilityStore;
use gatewayrs_aggregation::AggregationServices;
use gatewayrs_fleet::FleetManager;
use std::sync::Arc;
use tracing::info;

pub struct ShutdownCoordinator {
    fleet: Arc<FleetManager>,
    aggregation: Arc<AggregationServices>,
    capabilities: Arc<CapabilityStore>,
}

impl ShutdownCoordinator {
    pub fn new(
        fleet: Arc<FleetManager>,
        aggregation: Arc<AggregationServices>,
        capabilities: Arc<CapabilityStore>,
    ) -> Self {
        ShutdownCoordinator {
            fleet,
            aggregation,
            capabilities,
        }
    }

    /// Tears down every upstream session for `session_id`, drops its
    /// capability record, and evicts its entry from every aggregation
    /// union cache. Fleet teardown awaits each upstream's `close()` to
    /// completion before returning, so no entry outlives this call.
    pub async fn close_session(&self, session_id: &str) {
        self.fleet.close_session(session_id).await;
        self.aggregation.tools.invalidate(session_id);
        self.aggregation.resources.invalidate(session_id);
        self.aggregation.prompts.invalidate(session_id);
        self.capabilities.remove(session_id);
        info!(session = %session_id, "session drained");
    }

    /// Process-wide drain, run once on the main serve loop's exit path.
    pub async fn close_all(&self) {
        self.fleet.close_all().await;
        info!("all sessions drained");
    }
}
