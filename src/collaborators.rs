//! External collaborator interfaces (spec §6): everything this crate needs
//! from the surrounding platform — match registry, identity, persistent
//! storage, chat/social graph, and the underlying matchmaker ticket
//! queue — modeled as `async_trait` traits rather than concrete network
//! clients, since transport/identity/storage are explicitly out of scope
//! (spec §1 Non-goals). Grounded on the trait-object collaborator shape used
//! by the `matchforge` SDK's storage backends, and on
//! `PocketRelay-Server/src/services/retriever/mod.rs`'s pattern of treating
//! an external service as an injected, swappable client.

use crate::error::CoreResult;
use crate::model::{MatchLabel, TeamIndex};
use crate::types::{ChannelId, MatchId, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;

/// Outcome of an atomic `JoinAttempt` RPC against the registry (spec §4.7
/// step 4), grounded on `evr_matchmaker.go`'s `JoinAttempt` reason codes:
/// `ErrJoinRejectedUnassignedLobby`, `ErrJoinRejectedNotModerator`, and
/// `ErrJoinRejectedLobbyFull` are three distinct, registry-decided outcomes,
/// not one collapsed "can't join" case. Duplicate-join detection stays out
/// of this enum: it's decided locally against [`crate::registry::SessionIndex`]
/// before the registry is ever consulted.
#[derive(Debug, Clone)]
pub enum JoinAttemptOutcome {
    /// The join was admitted and recorded; carries the post-join label.
    Joined(MatchLabel),
    /// No match registered under the requested id.
    NotFound,
    /// The lobby has no level assigned yet.
    UnassignedLobby,
    /// The lobby is closed to new players and the joiner isn't exempt.
    NotModerator,
    /// The lobby is at capacity and the joiner isn't exempt.
    LobbyFull,
}

/// The authoritative store of match labels, queryable by the boolean query
/// language built in [`crate::query`] (spec §4.2, §6).
#[async_trait]
pub trait MatchRegistry: Send + Sync {
    /// Registers a freshly-allocated match, claiming its broadcaster.
    async fn match_create(&self, label: &MatchLabel) -> CoreResult<()>;

    /// Replaces a match's label wholesale (population/size/open changes).
    async fn match_update(&self, label: &MatchLabel) -> CoreResult<()>;

    /// Returns every currently-registered label matching `query`, already
    /// boolean-filtered by MUST/MUST_NOT; ordering is the caller's concern.
    async fn match_list(&self, query: &str, limit: usize) -> CoreResult<Vec<MatchLabel>>;

    async fn match_get(&self, match_id: &MatchId) -> CoreResult<Option<MatchLabel>>;

    async fn match_delete(&self, match_id: &MatchId) -> CoreResult<()>;

    /// Atomically checks admission and, if admitted, increments `size` and
    /// persists the label in one step — the registry's `JoinAttempt` RPC
    /// (spec §4.7 step 4, §6), not a separate get/check/update sequence a
    /// second concurrent joiner could race between.
    async fn join_attempt(&self, match_id: &MatchId, team_index: TeamIndex) -> CoreResult<JoinAttemptOutcome>;

    /// Delivers an out-of-band control payload to the broadcaster hosting
    /// `match_id` — the registry's `Signal` RPC (spec §4.6 step 7, §6), used
    /// to push the `StartSession` frame once a match is allocated.
    async fn match_signal(&self, match_id: &MatchId, payload: Vec<u8>) -> CoreResult<()>;
}

/// Resolves a user's identity facts relevant to matchmaking eligibility
/// (spec §4.7, §4.8): which channels they may play in, and their suspension
/// status is handled separately by [`Storage`].
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn accessible_channels(&self, user: &UserId) -> CoreResult<Vec<ChannelId>>;

    async fn display_name(&self, user: &UserId) -> CoreResult<String>;
}

/// Persistent state this core reads and writes but does not own the schema
/// of: suspensions, and any other durable record the host platform keeps
/// (spec §4.8).
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_suspensions(&self, user: &UserId) -> CoreResult<Vec<crate::suspension::Suspension>>;

    async fn write_suspension(&self, suspension: &crate::suspension::Suspension) -> CoreResult<()>;

    async fn delete_suspension(&self, user: &UserId, channel: &ChannelId) -> CoreResult<()>;
}

/// The chat/social platform's guild-role facts, consulted by the suspension
/// gate (spec §4.8).
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn has_moderator_role(&self, user: &UserId, channel: &ChannelId) -> CoreResult<bool>;

    /// Role ids the guild backing this channel has configured as
    /// suspension-gating; empty means the guild has no suspension policy at
    /// all (spec §4.8 step 1).
    async fn guild_suspension_roles(&self, channel: &ChannelId) -> CoreResult<Vec<String>>;

    /// Role ids `user` currently holds in the guild backing this channel.
    async fn user_roles(&self, user: &UserId, channel: &ChannelId) -> CoreResult<Vec<String>>;

    /// The chat-platform id for `user`, if they have a linked account.
    async fn chat_user_id(&self, user: &UserId) -> CoreResult<Option<String>>;

    /// Display name of the guild backing this channel.
    async fn guild_name(&self, channel: &ChannelId) -> CoreResult<String>;
}

/// The underlying matchmaker ticket queue: submitting a ticket and polling
/// for a match are owned by the host platform; this crate only shapes the
/// ticket properties and query (spec §4.6 "Matchmaker path").
#[async_trait]
pub trait Matchmaker: Send + Sync {
    async fn submit_ticket(
        &self,
        query: &str,
        properties: &std::collections::HashMap<String, String>,
        min_count: u32,
        max_count: u32,
    ) -> CoreResult<String>;

    async fn cancel_ticket(&self, ticket_id: &str) -> CoreResult<()>;
}

/// In-memory fakes used by unit and integration tests so collaborator
/// behavior can be exercised without a real backing platform.
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeMatchRegistry {
        labels: DashMap<MatchId, MatchLabel>,
        signals: DashMap<MatchId, Vec<u8>>,
    }

    impl FakeMatchRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, label: MatchLabel) {
            self.labels.insert(label.match_id, label);
        }

        /// The most recent `match_signal` payload delivered to `match_id`,
        /// for tests asserting a `StartSession` frame was actually sent.
        pub fn last_signal(&self, match_id: &MatchId) -> Option<Vec<u8>> {
            self.signals.get(match_id).map(|entry| entry.value().clone())
        }
    }

    /// Matches `query` against the `lobby_type:` token [`crate::query`]'s
    /// builders emit, if any; a query silent on lobby type matches every
    /// lobby type (preserves callers that search with an unscoped `""`).
    fn matches_lobby_type_filter(query: &str, lobby_type: crate::model::LobbyType) -> bool {
        let token = match lobby_type {
            crate::model::LobbyType::Public => "lobby_type:public",
            crate::model::LobbyType::Private => "lobby_type:private",
            crate::model::LobbyType::Unassigned => "lobby_type:unassigned",
        };
        if !query.contains("lobby_type:") {
            return true;
        }
        query.contains(token)
    }

    #[async_trait]
    impl MatchRegistry for FakeMatchRegistry {
        async fn match_create(&self, label: &MatchLabel) -> CoreResult<()> {
            self.labels.insert(label.match_id, label.clone());
            Ok(())
        }

        async fn match_update(&self, label: &MatchLabel) -> CoreResult<()> {
            self.labels.insert(label.match_id, label.clone());
            Ok(())
        }

        async fn match_list(&self, query: &str, limit: usize) -> CoreResult<Vec<MatchLabel>> {
            Ok(self
                .labels
                .iter()
                .filter(|entry| matches_lobby_type_filter(query, entry.value().lobby_type))
                .take(limit)
                .map(|entry| entry.value().clone())
                .collect())
        }

        async fn match_get(&self, match_id: &MatchId) -> CoreResult<Option<MatchLabel>> {
            Ok(self.labels.get(match_id).map(|entry| entry.value().clone()))
        }

        async fn match_delete(&self, match_id: &MatchId) -> CoreResult<()> {
            self.labels.remove(match_id);
            Ok(())
        }

        async fn join_attempt(&self, match_id: &MatchId, team_index: TeamIndex) -> CoreResult<JoinAttemptOutcome> {
            let Some(mut entry) = self.labels.get_mut(match_id) else {
                return Ok(JoinAttemptOutcome::NotFound);
            };

            if entry.lobby_type == crate::model::LobbyType::Unassigned {
                return Ok(JoinAttemptOutcome::UnassignedLobby);
            }

            let exempt = team_index.is_spectator_or_moderator();

            if !entry.open && !exempt {
                return Ok(JoinAttemptOutcome::NotModerator);
            }

            if entry.size >= entry.max_size && !exempt {
                return Ok(JoinAttemptOutcome::LobbyFull);
            }

            entry.size += 1;
            Ok(JoinAttemptOutcome::Joined(entry.clone()))
        }

        async fn match_signal(&self, match_id: &MatchId, payload: Vec<u8>) -> CoreResult<()> {
            self.signals.insert(*match_id, payload);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeIdentityService {
        channels: DashMap<UserId, Vec<ChannelId>>,
    }

    impl FakeIdentityService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn grant(&self, user: UserId, channels: Vec<ChannelId>) {
            self.channels.insert(user, channels);
        }
    }

    #[async_trait]
    impl IdentityService for FakeIdentityService {
        async fn accessible_channels(&self, user: &UserId) -> CoreResult<Vec<ChannelId>> {
            Ok(self.channels.get(user).map(|e| e.clone()).unwrap_or_default())
        }

        async fn display_name(&self, user: &UserId) -> CoreResult<String> {
            Ok(user.to_string())
        }
    }

    #[derive(Default)]
    pub struct FakeStorage {
        suspensions: Mutex<Vec<crate::suspension::Suspension>>,
    }

    impl FakeStorage {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Storage for FakeStorage {
        async fn read_suspensions(&self, user: &UserId) -> CoreResult<Vec<crate::suspension::Suspension>> {
            Ok(self
                .suspensions
                .lock()
                .iter()
                .filter(|s| &s.user == user)
                .cloned()
                .collect())
        }

        async fn write_suspension(&self, suspension: &crate::suspension::Suspension) -> CoreResult<()> {
            self.suspensions.lock().push(suspension.clone());
            Ok(())
        }

        async fn delete_suspension(&self, user: &UserId, channel: &ChannelId) -> CoreResult<()> {
            self.suspensions
                .lock()
                .retain(|s| !(&s.user == user && &s.channel == channel));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeChatPlatform {
        moderators: DashMap<(UserId, ChannelId), bool>,
        guild_roles: DashMap<ChannelId, Vec<String>>,
        user_roles: DashMap<(UserId, ChannelId), Vec<String>>,
        guild_names: DashMap<ChannelId, String>,
        chat_ids: DashMap<UserId, String>,
    }

    impl FakeChatPlatform {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_moderator(&self, user: UserId, channel: ChannelId, is_moderator: bool) {
            self.moderators.insert((user, channel), is_moderator);
        }

        pub fn set_guild_suspension_roles(&self, channel: ChannelId, roles: Vec<String>) {
            self.guild_roles.insert(channel, roles);
        }

        pub fn set_user_roles(&self, user: UserId, channel: ChannelId, roles: Vec<String>) {
            self.user_roles.insert((user, channel), roles);
        }

        pub fn set_guild_name(&self, channel: ChannelId, name: impl Into<String>) {
            self.guild_names.insert(channel, name.into());
        }

        pub fn set_chat_user_id(&self, user: UserId, chat_id: impl Into<String>) {
            self.chat_ids.insert(user, chat_id.into());
        }
    }

    #[async_trait]
    impl ChatPlatform for FakeChatPlatform {
        async fn has_moderator_role(&self, user: &UserId, channel: &ChannelId) -> CoreResult<bool> {
            Ok(self
                .moderators
                .get(&(*user, *channel))
                .map(|e| *e)
                .unwrap_or(false))
        }

        async fn guild_suspension_roles(&self, channel: &ChannelId) -> CoreResult<Vec<String>> {
            Ok(self.guild_roles.get(channel).map(|e| e.clone()).unwrap_or_default())
        }

        async fn user_roles(&self, user: &UserId, channel: &ChannelId) -> CoreResult<Vec<String>> {
            Ok(self
                .user_roles
                .get(&(*user, *channel))
                .map(|e| e.clone())
                .unwrap_or_default())
        }

        async fn chat_user_id(&self, user: &UserId) -> CoreResult<Option<String>> {
            Ok(self.chat_ids.get(user).map(|e| e.clone()))
        }

        async fn guild_name(&self, channel: &ChannelId) -> CoreResult<String> {
            Ok(self
                .guild_names
                .get(channel)
                .map(|e| e.clone())
                .unwrap_or_else(|| channel.to_string()))
        }
    }

    #[derive(Default)]
    pub struct FakeMatchmaker {
        tickets: Mutex<HashSet<String>>,
    }

    impl FakeMatchmaker {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Matchmaker for FakeMatchmaker {
        async fn submit_ticket(
            &self,
            _query: &str,
            _properties: &std::collections::HashMap<String, String>,
            _min_count: u32,
            _max_count: u32,
        ) -> CoreResult<String> {
            let id = uuid::Uuid::new_v4().to_string();
            self.tickets.lock().insert(id.clone());
            Ok(id)
        }

        async fn cancel_ticket(&self, ticket_id: &str) -> CoreResult<()> {
            self.tickets.lock().remove(ticket_id);
            Ok(())
        }
    }
}
