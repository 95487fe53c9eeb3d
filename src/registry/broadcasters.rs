//! Broadcaster registry (spec §4.3): `Register`/`Unregister`/`Range`/
//! `UpdateBroadcasters`/`Load`. Grounded on
//! `PocketRelay-Server/src/services/game/store.rs`'s `Games` registry and on
//! `tunnel/mod.rs`'s `Mutex<HashMap<..>>` registration discipline, but backed
//! by `dashmap` for lock-free per-key access rather than a single `RwLock`
//! guarding the whole map.

use crate::endpoint::Endpoint;
use crate::model::Broadcaster;
use crate::types::{SessionId, UserId};
use dashmap::DashMap;
use std::collections::HashSet;

/// Tracks every currently-registered broadcaster, keyed by its network
/// identity, plus which registration session owns each endpoint so a
/// departing session's broadcasters can all be dropped at once.
#[derive(Default)]
pub struct BroadcasterRegistry {
    broadcasters: DashMap<Endpoint, Broadcaster>,
    owners: DashMap<SessionId, HashSet<Endpoint>>,
}

impl BroadcasterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent by endpoint identity: replaces the prior record for the
    /// same endpoint, if any (spec §4.3).
    pub fn register(&self, session_id: SessionId, broadcaster: Broadcaster) {
        let endpoint = broadcaster.endpoint.clone();
        self.broadcasters.insert(endpoint.clone(), broadcaster);
        self.owners.entry(session_id).or_default().insert(endpoint);
    }

    /// Removes every broadcaster owned by `session_id` (its registration
    /// session disconnected).
    pub fn unregister(&self, session_id: &SessionId) {
        if let Some((_, endpoints)) = self.owners.remove(session_id) {
            for endpoint in endpoints {
                self.broadcasters.remove(&endpoint);
            }
        }
    }

    pub fn load(&self, endpoint: &Endpoint) -> Option<Broadcaster> {
        self.broadcasters.get(endpoint).map(|entry| entry.clone())
    }

    /// Snapshot of every registered broadcaster, for search/allocation scans
    /// (a `Range` that can't literally short-circuit over a `DashMap`
    /// snapshot, so callers iterate the returned `Vec` and break early
    /// themselves).
    pub fn range(&self) -> Vec<Broadcaster> {
        self.broadcasters
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.broadcasters.len()
    }

    /// Ensures every endpoint the latency layer just observed has a
    /// broadcaster record, filling in best-effort unknown region/channels
    /// for any that aren't already registered (spec §4.3
    /// `UpdateBroadcasters`).
    pub fn update_broadcasters(&self, endpoints: &[Endpoint], operator_user_id: UserId) {
        for endpoint in endpoints {
            self.broadcasters
                .entry(endpoint.clone())
                .or_insert_with(|| Broadcaster::unknown(endpoint.clone(), operator_user_id));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use uuid::Uuid;

    fn sample_broadcaster(endpoint: Endpoint) -> Broadcaster {
        Broadcaster::unknown(endpoint, Uuid::new_v4())
    }

    #[test]
    fn register_then_load_round_trips() {
        let registry = BroadcasterRegistry::new();
        let session = Uuid::new_v4();
        let endpoint = Endpoint::new("10.0.0.1", "1.2.3.4", 1000);
        registry.register(session, sample_broadcaster(endpoint.clone()));
        assert!(registry.load(&endpoint).is_some());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn unregister_drops_every_broadcaster_owned_by_the_session() {
        let registry = BroadcasterRegistry::new();
        let session = Uuid::new_v4();
        let e1 = Endpoint::new("10.0.0.1", "1.2.3.4", 1000);
        let e2 = Endpoint::new("10.0.0.2", "1.2.3.4", 1000);
        registry.register(session, sample_broadcaster(e1.clone()));
        registry.register(session, sample_broadcaster(e2.clone()));

        registry.unregister(&session);

        assert!(registry.load(&e1).is_none());
        assert!(registry.load(&e2).is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn update_broadcasters_fills_in_missing_records_only() {
        let registry = BroadcasterRegistry::new();
        let session = Uuid::new_v4();
        let known = Endpoint::new("10.0.0.1", "1.2.3.4", 1000);
        let unknown = Endpoint::new("10.0.0.2", "1.2.3.4", 1000);
        registry.register(session, sample_broadcaster(known.clone()));

        registry.update_broadcasters(&[known.clone(), unknown.clone()], Uuid::new_v4());

        assert_eq!(registry.count(), 2);
        assert!(registry.load(&unknown).is_some());
    }
}
