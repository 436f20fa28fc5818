//! Aggregation services (component F): tools, resources, prompts.

mod prompts;
mod resources;
mod tools;

pub use prompts::PromptsAggregationService;
pub use resources::ResourcesAggregationService;
pub use tools::ToolsAggregationService;

use gatewayrs_core::ListChangeKind;
use gatewayrs_fleet::FleetManager;
use std::sync::Arc;

/// Bundles the three session-scoped aggregation services and wires their
/// cache invalidation to the fleet's list-change fan-out. Constructed once
/// per process; every method is keyed by `DownstreamSessionId`.
pub struct AggregationServices {
    pub tools: Arc<ToolsAggregationService>,
    pub resources: Arc<ResourcesAggregationService>,
    pub prompts: Arc<PromptsAggregationService>,
}

impl AggregationServices {
    pub fn new(fleet: Arc<FleetManager>) -> Self {
        let tools = Arc::new(ToolsAggregationService::new(fleet.clone()));
        let resources = Arc::new(ResourcesAggregationService::new(fleet.clone()));
        let prompts = Arc::new(PromptsAggregationService::new(fleet.clone()));

        let tools_for_cb = tools.clone();
        fleet.on_list_changed(
            ListChangeKind::Tools,
            "aggregation-tools",
            Arc::new(move |_peer, session| tools_for_cb.invalidate(&session)),
        );

        let resources_for_cb = resources.clone();
        fleet.on_list_changed(
            ListChangeKind::Resources,
            "aggregation-resources",
            Arc::new(move |_peer, session| resources_for_cb.invalidate(&session)),
        );

        let prompts_for_cb = prompts.clone();
        fleet.on_list_changed(
            ListChangeKind::Prompts,
            "aggregation-prompts",
            Arc::new(move |_peer, session| prompts_for_cb.invalidate(&session)),
        );

        AggregationServices {
            tools,
            resources,
            prompts,
        }
    }
}
