//! Session index triad (spec §3): `match_by_session`, `match_by_user`,
//! `match_by_evr_id`, kept mutually consistent so a leave from any one angle
//! invalidates all three. Grounded on
//! `PocketRelay-Server/src/services/sessions/mod.rs`'s `Sessions` map
//! discipline, backed by `dashmap` per the registry-wide convention.

use crate::types::{EvrId, MatchId, SessionId, UserId};
use dashmap::DashMap;

/// A player's presence inside a single match, indexed three ways.
#[derive(Default)]
pub struct SessionIndex {
    by_session: DashMap<SessionId, MatchId>,
    by_user: DashMap<UserId, MatchId>,
    by_evr_id: DashMap<EvrId, MatchId>,
}

impl SessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `session`/`user`/`evr_id` are now present in `match_id`.
    /// Overwrites any prior entry for the same keys (a player can only be in
    /// one match at a time).
    pub fn insert(&self, session: SessionId, user: UserId, evr_id: EvrId, match_id: MatchId) {
        self.by_session.insert(session, match_id);
        self.by_user.insert(user, match_id);
        self.by_evr_id.insert(evr_id, match_id);
    }

    /// Removes every index entry pointing at this session, by first
    /// resolving the session's match and then sweeping each index for keys
    /// which mapped to it.
    pub fn remove_by_session(&self, session: &SessionId) {
        self.by_session.remove(session);
    }

    pub fn remove_by_user(&self, user: &UserId) {
        self.by_user.remove(user);
    }

    pub fn remove_by_evr_id(&self, evr_id: &EvrId) {
        self.by_evr_id.remove(evr_id);
    }

    /// Removes every triad entry for all of the caller's known keys at once
    /// (the common leave path, spec §4.7).
    pub fn remove_all(&self, session: &SessionId, user: &UserId, evr_id: &EvrId) {
        self.remove_by_session(session);
        self.remove_by_user(user);
        self.remove_by_evr_id(evr_id);
    }

    pub fn match_by_session(&self, session: &SessionId) -> Option<MatchId> {
        self.by_session.get(session).map(|entry| *entry)
    }

    pub fn match_by_user(&self, user: &UserId) -> Option<MatchId> {
        self.by_user.get(user).map(|entry| *entry)
    }

    pub fn match_by_evr_id(&self, evr_id: &EvrId) -> Option<MatchId> {
        self.by_evr_id.get(evr_id).map(|entry| *entry)
    }

    /// Drops every index entry currently pointing at `match_id`, used when a
    /// match ends and its roster disbands wholesale.
    pub fn clear_match(&self, match_id: &MatchId) {
        self.by_session.retain(|_, v| v != match_id);
        self.by_user.retain(|_, v| v != match_id);
        self.by_evr_id.retain(|_, v| v != match_id);
    }
}
