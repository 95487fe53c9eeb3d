//! Party registry (spec §9 design note): a party is identified by a
//! deterministic id derived from its group id via UUID v5, so every member
//! submitting a matchmaking ticket independently arrives at the same party
//! id without a round trip through a coordinator. Grounded on
//! `evr_matchmaker.go`'s `MatchMake` party-id derivation, kept as a registry
//! of its own (decoupled from [`crate::matchmaker`]) per the open-question
//! decision recorded in DESIGN.md.

use crate::types::UserId;
use dashmap::DashMap;
use uuid::Uuid;

/// Namespace used to derive deterministic party ids, matching the
/// nil-namespace convention in the original matchmaker.
const PARTY_NAMESPACE: Uuid = Uuid::nil();

pub type PartyId = Uuid;

/// Deterministically derives a party's id from its group id, so any member
/// can compute it without asking the registry first.
pub fn party_id_for_group(group_id: &str) -> PartyId {
    Uuid::new_v5(&PARTY_NAMESPACE, group_id.as_bytes())
}

struct PartyState {
    members: Vec<UserId>,
    capacity: usize,
}

/// Tracks live party membership so the matchmaker ticket path can size a
/// party's combined query and detect when a party is already full.
#[derive(Default)]
pub struct PartyRegistry {
    parties: DashMap<PartyId, PartyState>,
}

impl PartyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically adds `user` to `party` if it has room, creating the party
    /// record on first use. Returns the party's size after the attempt and
    /// whether the join succeeded.
    pub fn join_if_space(&self, party: PartyId, user: UserId, capacity: usize) -> (usize, bool) {
        let mut entry = self
            .parties
            .entry(party)
            .or_insert_with(|| PartyState {
                members: Vec::new(),
                capacity,
            });

        if entry.members.contains(&user) {
            return (entry.members.len(), true);
        }

        if entry.members.len() >= entry.capacity {
            return (entry.members.len(), false);
        }

        entry.members.push(user);
        (entry.members.len(), true)
    }

    pub fn leave(&self, party: &PartyId, user: &UserId) {
        if let Some(mut entry) = self.parties.get_mut(party) {
            entry.members.retain(|m| m != user);
        }
    }

    pub fn size(&self, party: &PartyId) -> usize {
        self.parties.get(party).map(|e| e.members.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn party_id_is_deterministic_per_group() {
        assert_eq!(party_id_for_group("guild-42"), party_id_for_group("guild-42"));
        assert_ne!(party_id_for_group("guild-42"), party_id_for_group("guild-43"));
    }

    #[test]
    fn join_if_space_respects_capacity() {
        let registry = PartyRegistry::new();
        let party = party_id_for_group("guild-1");
        let (a_size, a_ok) = registry.join_if_space(party, Uuid::new_v4(), 2);
        assert!(a_ok);
        assert_eq!(a_size, 1);

        let (b_size, b_ok) = registry.join_if_space(party, Uuid::new_v4(), 2);
        assert!(b_ok);
        assert_eq!(b_size, 2);

        let (c_size, c_ok) = registry.join_if_space(party, Uuid::new_v4(), 2);
        assert!(!c_ok);
        assert_eq!(c_size, 2);
    }

    #[test]
    fn rejoining_same_user_is_idempotent() {
        let registry = PartyRegistry::new();
        let party = party_id_for_group("guild-2");
        let user = Uuid::new_v4();
        registry.join_if_space(party, user, 4);
        let (size, ok) = registry.join_if_space(party, user, 4);
        assert!(ok);
        assert_eq!(size, 1);
    }
}
