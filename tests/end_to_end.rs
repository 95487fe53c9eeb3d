//! End-to-end scenarios S1-S7 (spec §8), exercised against in-memory fake
//! collaborators rather than a real platform.

use chrono::{Duration as ChronoDuration, Utc};
use lobby_core::backfill::select_backfill_candidate;
use lobby_core::collaborators::fake::{FakeChatPlatform, FakeMatchRegistry, FakeStorage};
use lobby_core::collaborators::{MatchRegistry, Storage};
use lobby_core::endpoint::Endpoint;
use lobby_core::error::CoreError;
use lobby_core::join::{join_match, PlayerPresence};
use lobby_core::model::{Broadcaster, LobbyType, MatchLabel, TeamIndex};
use lobby_core::registry::{CooldownSet, SessionIndex};
use lobby_core::search::{rank_candidates, Candidate};
use lobby_core::suspension::{check_suspension, Suspension};
use lobby_core::symbol_table::{mode_arena_public, mode_combat_public};
use uuid::Uuid;

fn label_with(size: i32, max_size: i32, mode: lobby_core::symbol::Symbol) -> MatchLabel {
    MatchLabel {
        match_id: Uuid::new_v4(),
        lobby_type: LobbyType::Public,
        mode,
        level: lobby_core::symbol::symbol("mpl_arena_a"),
        broadcaster: Broadcaster::unknown(Endpoint::unknown(), Uuid::new_v4()),
        channel: Uuid::new_v4(),
        size,
        max_size,
        open: true,
        team_index: TeamIndex::Unassigned,
        spawned_by: Uuid::new_v4(),
    }
}

/// S1 — Public Arena backfill under 90 ms: E1 (40ms, size 5), E2 (80ms, size
/// 6). Expected sort [E2, E1]; selected E2.
#[test]
fn s1_public_arena_backfill_under_90ms() {
    let e1 = label_with(5, 8, mode_arena_public());
    let e2 = label_with(6, 8, mode_arena_public());
    let e1_id = e1.match_id;
    let e2_id = e2.match_id;

    let mut candidates = vec![
        Candidate { label: e1, rtt: Some(40) },
        Candidate { label: e2, rtt: Some(80) },
    ];
    rank_candidates(mode_arena_public(), &mut candidates);

    assert_eq!(candidates[0].label.match_id, e2_id);
    assert_eq!(candidates[1].label.match_id, e1_id);

    let cooldowns = CooldownSet::new();
    let picked = select_backfill_candidate(mode_arena_public(), candidates, &cooldowns)
        .unwrap()
        .unwrap();
    assert_eq!(picked.label.match_id, e2_id);
}

/// S2 — Public Arena crosses 90 ms threshold: E1 (120ms, size 8), E2 (85ms,
/// size 2). Expected sort [E2, E1] — under-90 wins regardless of population.
#[test]
fn s2_public_arena_crosses_90ms_threshold() {
    let e1 = label_with(8, 8, mode_arena_public());
    let e2 = label_with(2, 8, mode_arena_public());
    let e1_id = e1.match_id;
    let e2_id = e2.match_id;

    let mut candidates = vec![
        Candidate { label: e1, rtt: Some(120) },
        Candidate { label: e2, rtt: Some(85) },
    ];
    rank_candidates(mode_arena_public(), &mut candidates);

    assert_eq!(candidates[0].label.match_id, e2_id);
    assert_eq!(candidates[1].label.match_id, e1_id);
}

/// S3 — Combat Public: population dominates. E1 (40ms, size 2), E2 (200ms,
/// size 7). Expected sort [E2, E1]; selected E2.
#[test]
fn s3_combat_public_population_dominates() {
    let e1 = label_with(2, 8, mode_combat_public());
    let e2 = label_with(7, 8, mode_combat_public());
    let e2_id = e2.match_id;

    let mut candidates = vec![
        Candidate { label: e1, rtt: Some(40) },
        Candidate { label: e2, rtt: Some(200) },
    ];
    rank_candidates(mode_combat_public(), &mut candidates);

    assert_eq!(candidates[0].label.match_id, e2_id);

    let cooldowns = CooldownSet::new();
    let picked = select_backfill_candidate(mode_combat_public(), candidates, &cooldowns)
        .unwrap()
        .unwrap();
    assert_eq!(picked.label.match_id, e2_id);
}

/// S4 — Backfill cooldown skip: cooldown contains `{match_X: now - 1s}`,
/// candidates [X, Y], Arena Public. Expected: X skipped, Y selected and
/// inserted into cooldown.
#[test]
fn s4_backfill_cooldown_skip() {
    let x = label_with(6, 8, mode_arena_public());
    let y = label_with(4, 8, mode_arena_public());
    let x_id = x.match_id;
    let y_id = y.match_id;

    let cooldowns = CooldownSet::new();
    cooldowns.mark(x_id);

    let candidates = vec![
        Candidate { label: x, rtt: Some(10) },
        Candidate { label: y, rtt: Some(10) },
    ];

    let picked = select_backfill_candidate(mode_arena_public(), candidates, &cooldowns)
        .unwrap()
        .unwrap();
    assert_eq!(picked.label.match_id, y_id);
    assert!(cooldowns.is_cooling(&y_id));
}

/// S5 — Allocation with no idle broadcaster: unassigned list empty.
/// Expected: `MatchCreate` returns `NoAvailableServers`; no mutation to
/// registry or cooldown.
#[tokio::test]
async fn s5_allocation_with_no_idle_broadcaster() {
    use lobby_core::backfill::{AllocationRequest, Allocator};

    let registry = FakeMatchRegistry::new();
    let allocator = Allocator::new();

    let request = AllocationRequest {
        mode: mode_arena_public(),
        level: lobby_core::symbol::symbol("mpl_arena_a"),
        channel: Uuid::new_v4(),
        max_size: 8,
        spawned_by: Uuid::new_v4(),
    };

    let result = allocator.allocate(&registry, vec![], request).await;
    assert!(matches!(result, Err(CoreError::NoAvailableServers)));
    assert!(registry.match_list("", 10).await.unwrap().is_empty());
}

/// S6 — Join on still-unassigned lobby: target match has
/// `lobby_type = Unassigned`. Expected: `FailedPrecondition`; none of the
/// session-index mappings are written.
#[tokio::test]
async fn s6_join_on_still_unassigned_lobby() {
    let registry = FakeMatchRegistry::new();
    let storage = FakeStorage::new();
    let chat = FakeChatPlatform::new();
    let sessions = SessionIndex::new();

    let mut label = label_with(0, 1, mode_arena_public());
    label.lobby_type = LobbyType::Unassigned;
    label.level = lobby_core::symbol::Symbol::NONE;
    registry.seed(label.clone());

    let presence = PlayerPresence::new(
        "node-1".to_string(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        "player-s6".to_string(),
        "Player S6".to_string(),
        "ovr-org-s6".to_string(),
        TeamIndex::Blue,
        None,
        String::new(),
    );
    let session = presence.session;

    let result = join_match(&registry, &storage, &chat, &sessions, label.match_id, presence).await;
    assert!(matches!(result, Err(CoreError::FailedPrecondition)));
    assert_eq!(sessions.match_by_session(&session), None);
}

/// S7 — Suspension expired: user has one suspension with expiry `now - 1
/// min`. Expected: that object is deleted and the gate returns "allow".
#[tokio::test]
async fn s7_suspension_expired() {
    let storage = FakeStorage::new();
    let chat = FakeChatPlatform::new();
    let user = Uuid::new_v4();
    let channel = Uuid::new_v4();
    let now = Utc::now();

    chat.set_guild_suspension_roles(channel, vec!["role:suspended".to_string()]);
    chat.set_user_roles(user, channel, vec!["role:suspended".to_string()]);
    storage
        .write_suspension(&Suspension {
            user,
            channel,
            reason: "cooldown".to_string(),
            imposed_by: Uuid::new_v4(),
            expires_at: now - ChronoDuration::minutes(1),
        })
        .await
        .unwrap();

    let result = check_suspension(&chat, &storage, &user, &channel, now).await.unwrap();
    assert!(result.is_empty());
    assert!(storage.read_suspensions(&user).await.unwrap().is_empty());
}
