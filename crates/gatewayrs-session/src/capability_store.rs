//! Capability store (component L): downstream-capability map keyed by
//! session. Write-once per session — set during `initialize`, read by the
//! fleet when attaching upstream peers.

use dashmap::DashMap;
use gatewayrs_core::{CapabilityRecord, DownstreamSessionId};

#[derive(Default)]
pub struct CapabilityStore {
    inner: DashMap<DownstreamSessionId, CapabilityRecord>,
}

impl CapabilityStore {
    pub fn new() -> Self {
        CapabilityStore { inner: DashMap::new() }
    }

    /// Returns `false` without overwriting if this session already has a
    /// recorded capability set.
    pub fn set(&self, session: &str, record: CapabilityRecord) -> bool {
        if self.inner.contains_key(session) {
            return false;
        }
        self.inner.insert(session.to_string(), record);
        true
    }

    pub fn get(&self, session: &str) -> Option<CapabilityRecord> {
        self.inner.get(session).map(|r| r.clone())
    }

    pub fn remove(&self, session: &str) {
        self.inner.remove(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_once_per_session() {
        let store = CapabilityStore::new();
        assert!(store.set("s1", CapabilityRecord { sampling: true, elicitation: false }));
        assert!(!store.set(
            "s1",
            CapabilityRecord {
                sampling: false,
                elicitation: true
            }
        ));
        assert!(store.get("s1").unwrap().sampling);
    }

    #[test]
    fn remove_clears_entry() {
        let store = CapabilityStore::new();
        store.set("s1", CapabilityRecord::default());
        store.remove("s1");
        assert!(store.get("s1").is_none());
    }
}
