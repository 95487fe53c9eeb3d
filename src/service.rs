//! Top-level service object (spec §9 design note): a single
//! `MatchmakingCore` owning every registry and mutex, constructed once at
//! startup and handed around as `Arc<MatchmakingCore>`. Grounded on
//! `PocketRelay-Server/src/main.rs`'s explicit `Arc<Sessions>` /
//! `Arc<Games>` / `Arc<Matchmaking>` wiring, deliberately avoiding the
//! older `unsafe static GLOBAL_STATE` pattern still present elsewhere in the
//! teacher repo.

use crate::backfill::{AllocationRequest, Allocator};
use crate::collaborators::{ChatPlatform, IdentityService, Matchmaker, MatchRegistry, Storage};
use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::{CoreError, CoreResult};
use crate::join::{join_match, PlayerPresence};
use crate::latency::{LatencyCache, PingTransport};
use crate::model::{MSessionTemplate, MatchLabel};
use crate::party::PartyRegistry;
use crate::query::build_unassigned_query;
use crate::registry::{BroadcasterRegistry, CooldownSet, SessionIndex};
use crate::search::{match_search_configured, match_sort_configured, select_backfill_candidate_configured};
use crate::suspension::check_suspension;
use crate::symbol::Symbol;
use crate::types::{EvrId, NodeId, RttMillis, SessionId, UserId};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Global matchmaking gate: when set, every new matchmaking/backfill
/// request is rejected up front (an operational kill switch, not part of
/// the spec's per-request invariants but needed for safe rollout/rollback).
#[derive(Default)]
struct RejectGate {
    rejecting: RwLock<bool>,
}

impl RejectGate {
    fn is_rejecting(&self) -> bool {
        *self.rejecting.read()
    }

    fn set(&self, rejecting: bool) {
        *self.rejecting.write() = rejecting;
    }
}

/// Owns every piece of mutable state the matchmaking core needs, plus
/// `dyn`-typed handles to the host platform's collaborators (spec §6).
pub struct MatchmakingCore {
    pub config: Config,
    pub broadcasters: BroadcasterRegistry,
    pub sessions: SessionIndex,
    pub cooldowns: Arc<CooldownSet>,
    pub latency: LatencyCache,
    pub parties: PartyRegistry,
    pub allocator: Allocator,
    reject_gate: RejectGate,

    pub match_registry: Arc<dyn MatchRegistry>,
    pub identity: Arc<dyn IdentityService>,
    pub storage: Arc<dyn Storage>,
    pub chat: Arc<dyn ChatPlatform>,
    pub matchmaker: Arc<dyn Matchmaker>,
}

impl MatchmakingCore {
    pub fn new(
        config: Config,
        match_registry: Arc<dyn MatchRegistry>,
        identity: Arc<dyn IdentityService>,
        storage: Arc<dyn Storage>,
        chat: Arc<dyn ChatPlatform>,
        matchmaker: Arc<dyn Matchmaker>,
    ) -> Arc<Self> {
        let latency_stale_after = Duration::from_secs(config.latency_stale_after_secs);
        let backfill_cooldown = Duration::from_secs(config.backfill_cooldown_secs);

        let core = Arc::new(Self {
            config,
            broadcasters: BroadcasterRegistry::new(),
            sessions: SessionIndex::new(),
            cooldowns: Arc::new(CooldownSet::with_duration(backfill_cooldown)),
            latency: LatencyCache::with_stale_after(latency_stale_after),
            parties: PartyRegistry::new(),
            allocator: Allocator::new(),
            reject_gate: RejectGate::default(),
            match_registry,
            identity,
            storage,
            chat,
            matchmaker,
        });

        core.cooldowns.clone().spawn_sweeper();
        core
    }

    /// Operational kill switch: reject all new matchmaking/backfill/join
    /// requests while `true`. Existing matches are unaffected.
    pub fn set_rejecting_matchmaking(&self, rejecting: bool) {
        self.reject_gate.set(rejecting);
    }

    pub fn is_rejecting_matchmaking(&self) -> bool {
        self.reject_gate.is_rejecting()
    }

    /// Cached latency readings for `user` against `endpoints`, omitting any
    /// without a fresh sample (spec §4.3 `GetLatencies`).
    pub fn latency_snapshot(&self, user: &UserId, endpoints: &[Endpoint]) -> Vec<(Endpoint, Option<RttMillis>)> {
        self.latency.get_latencies(user, endpoints)
    }

    /// `FindSession(request)` (spec §4.6 "Matchmaker path" control flow,
    /// §9): the end-to-end path a matchmaking request takes from arrival to
    /// a joined match — suspension gate, live-match search and ranking,
    /// backfill selection, falling back to unassigned-lobby allocation when
    /// backfill comes up empty, then the join coordinator. Grounded on
    /// `evr_matchmaker.go`'s top-level `FindSession`/`Backfill` dispatcher,
    /// which is the one place all of those steps are actually stitched
    /// together in order.
    pub async fn find_session(
        &self,
        transport: Arc<dyn PingTransport>,
        request: FindSessionRequest,
    ) -> CoreResult<MatchLabel> {
        if self.is_rejecting_matchmaking() {
            return Err(CoreError::NoAvailableServers);
        }

        let suspensions = check_suspension(
            self.chat.as_ref(),
            self.storage.as_ref(),
            &request.user,
            &request.template.channel,
            Utc::now(),
        )
        .await?;
        if !suspensions.is_empty() {
            return Err(CoreError::PermissionDenied);
        }

        let ping_deadline = Duration::from_secs(self.config.ping_timeout_secs);
        let arena_rtt_threshold_ms = self.config.arena_rtt_threshold_ms;

        let candidates = match_search_configured(
            self.match_registry.as_ref(),
            transport.clone(),
            &self.broadcasters,
            &self.latency,
            request.user,
            &request.template,
            request.max_size,
            50,
            arena_rtt_threshold_ms,
            ping_deadline,
            &request.cancellation,
        )
        .await?;

        let picked = select_backfill_candidate_configured(
            request.template.mode,
            candidates,
            self.cooldowns.as_ref(),
            arena_rtt_threshold_ms,
        )?;

        let label = match picked {
            Some(candidate) => candidate.label,
            None => self.allocate_unassigned(transport, &request, ping_deadline, arena_rtt_threshold_ms).await?,
        };

        let player = PlayerPresence::new(
            request.node,
            request.user,
            request.session,
            request.username,
            request.display_name,
            request.evr_id,
            request.template.team_index,
            request.discord_id,
            String::new(),
        );

        join_match(
            self.match_registry.as_ref(),
            self.storage.as_ref(),
            self.chat.as_ref(),
            &self.sessions,
            label.match_id,
            player,
        )
        .await
    }

    /// Lists and ranks currently-unassigned lobbies, then claims the
    /// best-ranked idle broadcaster via [`Allocator::allocate`] (spec §4.6
    /// steps 2-3, §4.2 `build_unassigned_query`).
    async fn allocate_unassigned(
        &self,
        transport: Arc<dyn PingTransport>,
        request: &FindSessionRequest,
        ping_deadline: Duration,
        arena_rtt_threshold_ms: RttMillis,
    ) -> CoreResult<MatchLabel> {
        let query = build_unassigned_query(&request.template.accessible_channels, request.template.region);
        let unassigned = self.match_registry.match_list(&query, 50).await?;

        let ranked = match_sort_configured(
            transport,
            &self.broadcasters,
            &self.latency,
            request.user,
            request.template.mode,
            unassigned,
            arena_rtt_threshold_ms,
            ping_deadline,
            &request.cancellation,
        )
        .await?;

        let idle_broadcasters = ranked.into_iter().map(|candidate| candidate.label.broadcaster).collect();

        self.allocator
            .allocate(
                self.match_registry.as_ref(),
                idle_broadcasters,
                AllocationRequest {
                    mode: request.template.mode,
                    level: request.level,
                    channel: request.template.channel,
                    max_size: request.max_size,
                    spawned_by: request.user,
                },
            )
            .await
    }
}

/// `FindSession(request)`'s input bundle (spec §4.6, §4.7): everything known
/// about the requesting player at the moment they enter matchmaking.
/// `cancellation` is this request's stand-in for the spec's session
/// context — tripping it abandons an in-flight latency probe early rather
/// than letting it run to its deadline.
pub struct FindSessionRequest {
    pub node: NodeId,
    pub user: UserId,
    pub session: SessionId,
    pub username: String,
    pub display_name: String,
    pub evr_id: EvrId,
    pub discord_id: Option<String>,
    pub template: MSessionTemplate,
    pub max_size: i32,
    pub level: Symbol,
    pub cancellation: CancellationToken,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collaborators::fake::{
        FakeChatPlatform, FakeIdentityService, FakeMatchRegistry, FakeMatchmaker, FakeStorage,
    };

    fn core() -> Arc<MatchmakingCore> {
        MatchmakingCore::new(
            Config::default(),
            Arc::new(FakeMatchRegistry::new()),
            Arc::new(FakeIdentityService::new()),
            Arc::new(FakeStorage::new()),
            Arc::new(FakeChatPlatform::new()),
            Arc::new(FakeMatchmaker::new()),
        )
    }

    #[test]
    fn reject_gate_defaults_to_open() {
        let core = core();
        assert!(!core.is_rejecting_matchmaking());
    }

    #[test]
    fn reject_gate_toggles() {
        let core = core();
        core.set_rejecting_matchmaking(true);
        assert!(core.is_rejecting_matchmaking());
    }

    use crate::endpoint::Endpoint;
    use crate::latency::PingTransport;
    use crate::model::{Broadcaster, LobbyType, TeamIndex};
    use crate::symbol::symbol;
    use crate::symbol_table::mode_arena_public;
    use uuid::Uuid;

    struct FixedTransport(Option<std::time::Duration>);

    #[async_trait::async_trait]
    impl PingTransport for FixedTransport {
        async fn ping(&self, _endpoint: &Endpoint) -> Option<std::time::Duration> {
            self.0
        }
    }

    fn template(channel: uuid::Uuid, mode: crate::symbol::Symbol) -> MSessionTemplate {
        MSessionTemplate {
            lobby_type: LobbyType::Public,
            mode,
            channel,
            accessible_channels: vec![],
            region: None,
            team_index: TeamIndex::Blue,
            party_size: 1,
            excluded_match: None,
        }
    }

    fn request(channel: uuid::Uuid, mode: crate::symbol::Symbol, level: crate::symbol::Symbol) -> FindSessionRequest {
        FindSessionRequest {
            node: "node-1".to_string(),
            user: Uuid::new_v4(),
            session: Uuid::new_v4(),
            username: "player1".to_string(),
            display_name: "Player One".to_string(),
            evr_id: "1-111".to_string(),
            discord_id: None,
            template: template(channel, mode),
            max_size: 8,
            level,
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn find_session_backfills_into_a_reachable_open_match() {
        let registry = Arc::new(FakeMatchRegistry::new());
        let core = MatchmakingCore::new(
            Config::default(),
            registry.clone(),
            Arc::new(FakeIdentityService::new()),
            Arc::new(FakeStorage::new()),
            Arc::new(FakeChatPlatform::new()),
            Arc::new(FakeMatchmaker::new()),
        );

        let mode = mode_arena_public();
        let level = symbol("mpl_arena_a");
        let channel = Uuid::new_v4();

        let label = MatchLabel {
            match_id: Uuid::new_v4(),
            lobby_type: LobbyType::Public,
            mode,
            level,
            broadcaster: Broadcaster::unknown(Endpoint::new("10.3.0.1", "1.2.3.4", 1000), Uuid::new_v4()),
            channel,
            size: 2,
            max_size: 8,
            open: true,
            team_index: TeamIndex::Unassigned,
            spawned_by: Uuid::new_v4(),
        };
        registry.seed(label.clone());

        let transport: Arc<dyn PingTransport> =
            Arc::new(FixedTransport(Some(std::time::Duration::from_millis(40))));

        let joined = core.find_session(transport, request(channel, mode, level)).await.unwrap();
        assert_eq!(joined.match_id, label.match_id);
        assert_eq!(joined.size, 3);
    }

    #[tokio::test]
    async fn find_session_allocates_when_nothing_to_backfill() {
        let registry = Arc::new(FakeMatchRegistry::new());
        let core = MatchmakingCore::new(
            Config::default(),
            registry.clone(),
            Arc::new(FakeIdentityService::new()),
            Arc::new(FakeStorage::new()),
            Arc::new(FakeChatPlatform::new()),
            Arc::new(FakeMatchmaker::new()),
        );

        let mode = mode_arena_public();
        let level = symbol("mpl_arena_a");
        let channel = Uuid::new_v4();

        let idle = MatchLabel {
            match_id: Uuid::new_v4(),
            lobby_type: LobbyType::Unassigned,
            mode: crate::symbol::Symbol::NONE,
            level: crate::symbol::Symbol::NONE,
            broadcaster: Broadcaster::unknown(Endpoint::new("10.3.0.2", "1.2.3.4", 1000), Uuid::new_v4()),
            channel: Uuid::nil(),
            size: 0,
            max_size: 0,
            open: true,
            team_index: TeamIndex::Unassigned,
            spawned_by: Uuid::new_v4(),
        };
        registry.seed(idle.clone());

        let transport: Arc<dyn PingTransport> =
            Arc::new(FixedTransport(Some(std::time::Duration::from_millis(40))));

        let joined = core.find_session(transport, request(channel, mode, level)).await.unwrap();
        assert_ne!(joined.match_id, idle.match_id);
        assert_eq!(joined.lobby_type, LobbyType::Public);
        assert_eq!(joined.size, 1);
    }

    #[tokio::test]
    async fn find_session_with_no_candidates_and_no_idle_broadcasters_fails() {
        let core = core();
        let mode = mode_arena_public();
        let level = symbol("mpl_arena_a");
        let channel = Uuid::new_v4();

        let transport: Arc<dyn PingTransport> = Arc::new(FixedTransport(None));
        let result = core.find_session(transport, request(channel, mode, level)).await;
        assert!(matches!(result, Err(CoreError::NoAvailableServers)));
    }
}
