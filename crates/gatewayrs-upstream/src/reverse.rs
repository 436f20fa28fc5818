//! Client-side reverse-request handler.
//!
//! `rmcp`'s client handshake accepts a handler value symmetric to the
//! server-side `ServerHandler` used by the gateway crate; this is where a
//! peer's `model/sample` and `elicit` reverse requests land before being
//! forwarded to the downstream consumer through a `ReverseRequestSink`. It
//! also receives the peer's own `tools/resources/prompts` list-changed
//! notifications and reports them to the fleet via `ListChangeNotifier`,
//! since the fleet crate sits above this one and can't be depended on
//! directly. Strict-capability enforcement happens here, locally, with no
//! wire traffic, per the fleet manager's capability-advertisement contract.

use gatewayrs_core::{CapabilityRecord, ListChangeKind, ListChangeNotifier, PeerName, ReverseRequestSink};
use rmcp::model::{CreateElicitationRequestParam, CreateElicitationResult, CreateMessageRequestParam, CreateMessageResult};
use rmcp::service::{NotificationContext, RequestContext};
use rmcp::{ClientHandler, ErrorData, RoleClient};
use std::sync::Arc;

#[derive(Clone)]
pub struct ReverseHandler {
    pub caps: CapabilityRecord,
    pub sink: Arc<dyn ReverseRequestSink>,
    pub session_id: String,
    pub peer: PeerName,
    pub notifier: Arc<dyn ListChangeNotifier>,
}

impl ClientHandler for ReverseHandler {
    async fn create_message(
        &self,
        params: CreateMessageRequestParam,
        _context: RequestContext<RoleClient>,
    ) -> Result<CreateMessageResult, ErrorData> {
        if !self.caps.sampling {
            return Err(ErrorData::invalid_request(
                "sampling capability not advertised by downstream",
                None,
            ));
        }

        let value = serde_json::to_value(&params)
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

        let result = self
            .sink
            .forward_sampling(&self.session_id, value)
            .await
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

        serde_json::from_value(result).map_err(|e| ErrorData::internal_error(e.to_string(), None))
    }

    async fn create_elicitation(
        &self,
        params: CreateElicitationRequestParam,
        _context: RequestContext<RoleClient>,
    ) -> Result<CreateElicitationResult, ErrorData> {
        if !self.caps.elicitation {
            return Err(ErrorData::invalid_request(
                "elicitation capability not advertised by downstream",
                None,
            ));
        }

        let value = serde_json::to_value(&params)
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

        let result = self
            .sink
            .forward_elicitation(&self.session_id, value)
            .await
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

        serde_json::from_value(result).map_err(|e| ErrorData::internal_error(e.to_string(), None))
    }

    async fn on_tools_list_changed(&self, _context: NotificationContext<RoleClient>) {
        self.notifier
            .notify_list_changed(ListChangeKind::Tools, &self.peer, &self.session_id)
            .await;
    }

    async fn on_resources_list_changed(&self, _context: NotificationContext<RoleClient>) {
        self.notifier
            .notify_list_changed(ListChangeKind::Resources, &self.peer, &self.session_id)
            .await;
    }

    async fn on_prompts_list_changed(&self, _context: NotificationContext<RoleClient>) {
        self.notifier
            .notify_list_changed(ListChangeKind::Prompts, &self.peer, &self.session_id)
            .await;
    }
}
