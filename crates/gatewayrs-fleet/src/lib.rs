//! Fleet manager (component E).
//!
//! Owns every upstream session keyed by `(peer, downstream session)`.
//! Attach is idempotent; failed attaches are recorded, not thrown; list-
//! change notifications fan out through process-wide handlers registered by
//! the aggregation/gateway layers (never by direct reference, to keep the
//! construction graph acyclic).

use async_trait::async_trait;
use dashmap::DashMap;
use gatewayrs_core::{CapabilityRecord, DownstreamSessionId, GatewayError, ListChangeKind, ListChangeNotifier, PeerName, ReverseRequestSink};
use gatewayrs_upstream::{ReverseHandler, UpstreamSession};
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

type Key = (PeerName, DownstreamSessionId);

enum FleetEntry {
    Connected(Arc<UpstreamSession>),
    Failed(String),
}

type ListChangeHandler = Arc<dyn Fn(PeerName, DownstreamSessionId) + Send + Sync>;

/// Owns all upstream sessions for every downstream session.
pub struct FleetManager {
    entries: DashMap<Key, FleetEntry>,
    tools_handlers: DashMap<String, ListChangeHandler>,
    resources_handlers: DashMap<String, ListChangeHandler>,
    prompts_handlers: DashMap<String, ListChangeHandler>,
}

impl Default for FleetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetManager {
    pub fn new() -> Self {
        FleetManager {
            entries: DashMap::new(),
            tools_handlers: DashMap::new(),
            resources_handlers: DashMap::new(),
            prompts_handlers: DashMap::new(),
        }
    }

    /// Idempotent registration: a handler registered twice under the same
    /// `name` is only invoked once per event.
    pub fn on_list_changed(&self, kind: ListChangeKind, name: &str, handler: ListChangeHandler) {
        let table = match kind {
            ListChangeKind::Tools => &self.tools_handlers,
            ListChangeKind::Resources => &self.resources_handlers,
            ListChangeKind::Prompts => &self.prompts_handlers,
        };
        table.entry(name.to_string()).or_insert(handler);
    }

    fn fan_out(&self, kind: ListChangeKind, peer: &PeerName, session: &DownstreamSessionId) {
        let table = match kind {
            ListChangeKind::Tools => &self.tools_handlers,
            ListChangeKind::Resources => &self.resources_handlers,
            ListChangeKind::Prompts => &self.prompts_handlers,
        };
        for handler in table.iter() {
            (handler.value())(peer.clone(), session.clone());
        }
    }

    /// Attach a streamed (HTTP) peer. Idempotent per `(peer, session)`.
    #[allow(clippy::too_many_arguments)]
    pub async fn attach_streamed(
        self: &Arc<Self>,
        peer: PeerName,
        url: &str,
        session: DownstreamSessionId,
        headers: HashMap<String, String>,
        allowlist: Option<HashSet<String>>,
        caps: Option<CapabilityRecord>,
        sink: Arc<dyn ReverseRequestSink>,
    ) -> Result<(), GatewayError> {
        let key = (peer.clone(), session.clone());
        if let Some(entry) = self.entries.get(&key) {
            if matches!(*entry, FleetEntry::Connected(_)) {
                return Ok(());
            }
        }

        let reverse_handler = ReverseHandler {
            caps: caps.unwrap_or_default(),
            sink,
            session_id: session.clone(),
            peer: peer.clone(),
            notifier: self.clone() as Arc<dyn ListChangeNotifier>,
        };

        match UpstreamSession::connect_streamed(peer.clone(), url, &headers, allowlist, reverse_handler).await {
            Ok(upstream) => {
                info!(%peer, %session, "attached streamed upstream");
                self.entries.insert(key, FleetEntry::Connected(Arc::new(upstream)));
                Ok(())
            }
            Err(e) => {
                warn!(%peer, %session, error = %e, "failed to attach streamed upstream");
                self.entries.insert(key, FleetEntry::Failed(e.redacted_message()));
                Err(e)
            }
        }
    }

    /// Attach a child-process peer. Idempotent per `(peer, session)`.
    #[allow(clippy::too_many_arguments)]
    pub async fn attach_child(
        self: &Arc<Self>,
        peer: PeerName,
        command: &str,
        session: DownstreamSessionId,
        args: Vec<String>,
        env: HashMap<String, String>,
        allowlist: Option<HashSet<String>>,
        caps: Option<CapabilityRecord>,
        sink: Arc<dyn ReverseRequestSink>,
    ) -> Result<(), GatewayError> {
        let key = (peer.clone(), session.clone());
        if let Some(entry) = self.entries.get(&key) {
            if matches!(*entry, FleetEntry::Connected(_)) {
                return Ok(());
            }
        }

        let reverse_handler = ReverseHandler {
            caps: caps.unwrap_or_default(),
            sink,
            session_id: session.clone(),
            peer: peer.clone(),
            notifier: self.clone() as Arc<dyn ListChangeNotifier>,
        };

        match UpstreamSession::connect_child(peer.clone(), command, &args, &env, allowlist, reverse_handler).await {
            Ok(upstream) => {
                info!(%peer, %session, "attached child-process upstream");
                self.entries.insert(key, FleetEntry::Connected(Arc::new(upstream)));
                Ok(())
            }
            Err(e) => {
                warn!(%peer, %session, error = %e, "failed to attach child-process upstream");
                self.entries.insert(key, FleetEntry::Failed(e.redacted_message()));
                Err(e)
            }
        }
    }

    pub fn get(&self, peer: &str, session: &str) -> Result<Arc<UpstreamSession>, GatewayError> {
        match self.entries.get(&(peer.to_string(), session.to_string())) {
            Some(entry) => match entry.value() {
                FleetEntry::Connected(s) => Ok(s.clone()),
                FleetEntry::Failed(reason) => Err(GatewayError::PeerConnectFailed(reason.clone())),
            },
            None => Err(GatewayError::PeerNotFound(peer.to_string())),
        }
    }

    /// All connected sessions for one downstream session, keyed by peer.
    pub fn list(&self, session: &str) -> HashMap<PeerName, Arc<UpstreamSession>> {
        self.entries
            .iter()
            .filter(|e| e.key().1 == session)
            .filter_map(|e| match e.value() {
                FleetEntry::Connected(s) => Some((e.key().0.clone(), s.clone())),
                FleetEntry::Failed(_) => None,
            })
            .collect()
    }

    /// Failure reasons (redacted) for one downstream session, keyed by peer.
    pub fn failures(&self, session: &str) -> HashMap<PeerName, String> {
        self.entries
            .iter()
            .filter(|e| e.key().1 == session)
            .filter_map(|e| match e.value() {
                FleetEntry::Failed(reason) => Some((e.key().0.clone(), reason.clone())),
                FleetEntry::Connected(_) => None,
            })
            .collect()
    }

    /// Invalidate the given session's cached list for `peer` and fan out a
    /// downstream-visible notification via the registered handlers.
    pub async fn notify_list_changed(&self, kind: ListChangeKind, peer: &str, session: &str) {
        if let Ok(upstream) = self.get(peer, session) {
            match kind {
                ListChangeKind::Tools => upstream.invalidate_tools().await,
                ListChangeKind::Resources => upstream.invalidate_resources().await,
                ListChangeKind::Prompts => upstream.invalidate_prompts().await,
            }
        }
        self.fan_out(kind, &peer.to_string(), &session.to_string());
    }

    /// Tear down every entry for one downstream session.
    pub async fn close_session(&self, session: &str) {
        let keys: Vec<Key> = self
            .entries
            .iter()
            .filter(|e| e.key().1 == session)
            .map(|e| e.key().clone())
            .collect();

        for key in keys {
            if let Some((_, entry)) = self.entries.remove(&key) {
                if let FleetEntry::Connected(upstream) = entry {
                    if let Some(upstream) = Arc::into_inner(upstream) {
                        upstream.close().await;
                    }
                }
            }
        }
        info!(%session, "closed fleet session");
    }

    pub async fn close_all(&self) {
        let sessions: HashSet<DownstreamSessionId> =
            self.entries.iter().map(|e| e.key().1.clone()).collect();
        for session in sessions {
            self.close_session(&session).await;
        }
    }
}

#[async_trait]
impl ListChangeNotifier for FleetManager {
    async fn notify_list_changed(&self, kind: ListChangeKind, peer: &str, session: &str) {
        FleetManager::notify_list_changed(self, kind, peer, session).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_on_empty_fleet_is_not_found() {
        let fleet = FleetManager::new();
        let result = fleet.get("calc", "s1");
        assert!(matches!(result, Err(GatewayError::PeerNotFound(_))));
    }

    #[tokio::test]
    async fn close_session_removes_every_entry_for_that_session() {
        let fleet = FleetManager::new();
        fleet
            .entries
            .insert(("calc".to_string(), "s1".to_string()), FleetEntry::Failed("x".into()));
        fleet
            .entries
            .insert(("data".to_string(), "s1".to_string()), FleetEntry::Failed("x".into()));
        fleet
            .entries
            .insert(("calc".to_string(), "s2".to_string()), FleetEntry::Failed("x".into()));

        fleet.close_session("s1").await;

        assert!(fleet.list("s1").is_empty());
        assert!(fleet.failures("s1").is_empty());
        assert_eq!(fleet.failures("s2").len(), 1);
    }

    #[test]
    fn list_changed_handler_registration_is_idempotent() {
        let fleet = FleetManager::new();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls2 = calls.clone();
        let handler: ListChangeHandler = Arc::new(move |_peer, _session| {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        fleet.on_list_changed(ListChangeKind::Resources, "aggregation", handler.clone());
        fleet.on_list_changed(ListChangeKind::Resources, "aggregation", handler);

        fleet.fan_out(ListChangeKind::Resources, &"data".to_string(), &"s1".to_string());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
