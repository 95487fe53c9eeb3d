//! Backfill candidate selection and unassigned-lobby allocation (spec §4.6),
//! grounded on `evr_matchmaker.go`'s `Backfill`/`ListUnassignedLobbies` and on
//! `PocketRelay-Server/src/services/game/matchmaking.rs`'s plain-`Mutex`
//! queue-processing style. The allocation step is additionally guarded by a
//! process-wide `parking_lot::Mutex` (spec §4.6, §9) so two concurrent
//! backfill attempts never both claim the same idle broadcaster.

use crate::collaborators::MatchRegistry;
use crate::error::{CoreError, CoreResult};
use crate::model::{Broadcaster, LobbyType, MatchLabel, TeamIndex};
use crate::protocol::{StartSessionCodec, StartSessionFrame};
use crate::registry::CooldownSet;
use crate::search::{rank_candidates_configured, Candidate, DEFAULT_ARENA_RTT_THRESHOLD_MS};
use crate::symbol::token_of;
use crate::symbol::Symbol;
use crate::types::{ChannelId, MatchId, RttMillis, UserId};
use bytes::BytesMut;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::codec::Encoder;

/// Picks the first candidate that is not in cooldown, scanning in the
/// search-ranked order produced by [`rank_candidates_configured`]. Every
/// non-cooling candidate visited along the way — not just the one
/// ultimately picked — is marked into cooldown as it's visited (spec §8
/// scenario S4: a candidate "selected and inserted into cooldown" in the
/// same step; the same protection extends to every candidate this call
/// looked at and passed over, so a second concurrent backfill attempt
/// doesn't immediately re-offer a lobby this call already considered).
/// Candidates already in cooldown are skipped rather than selected (spec §9
/// decision: "first non-cooling candidate wins", not "last one scanned
/// wins").
///
/// When the `backfill-last-candidate-wins` feature is enabled, the loop
/// instead keeps overwriting its pick on every non-cooling candidate it
/// sees, ending on the last one scanned. That reproduces the literal
/// `evr_matchmaker.go` `Backfill` loop, which never breaks out early.
///
/// Backfill applies to Public lobbies only; a Private candidate slipping
/// into the list is a caller bug, not a skippable candidate, so it fails
/// fast with `InvalidArgument` rather than being silently passed over (spec
/// §4.6).
pub fn select_backfill_candidate(
    mode: Symbol,
    candidates: Vec<Candidate>,
    cooldowns: &CooldownSet,
) -> CoreResult<Option<Candidate>> {
    select_backfill_candidate_configured(mode, candidates, cooldowns, DEFAULT_ARENA_RTT_THRESHOLD_MS)
}

/// As [`select_backfill_candidate`], but with the Arena Public ranking
/// threshold read from operator configuration instead of the built-in
/// default.
pub fn select_backfill_candidate_configured(
    mode: Symbol,
    mut candidates: Vec<Candidate>,
    cooldowns: &CooldownSet,
    arena_rtt_threshold_ms: RttMillis,
) -> CoreResult<Option<Candidate>> {
    if let Some(private) = candidates.iter().find(|c| c.label.lobby_type == LobbyType::Private) {
        return Err(CoreError::InvalidArgument(format!(
            "backfill candidate {} is a Private lobby",
            private.label.match_id
        )));
    }

    rank_candidates_configured(mode, &mut candidates, arena_rtt_threshold_ms);

    let mut picked: Option<Candidate> = None;
    for candidate in candidates {
        if cooldowns.is_cooling(&candidate.label.match_id) {
            continue;
        }

        cooldowns.mark(candidate.label.match_id);

        if cfg!(feature = "backfill-last-candidate-wins") {
            picked = Some(candidate);
        } else {
            picked = Some(candidate);
            break;
        }
    }

    Ok(picked)
}

/// Marks a backfill candidate that was offered to a player but declined (the
/// player didn't fit, or join failed) as cooling again, so it isn't
/// immediately re-offered (spec §5).
pub fn skip_candidate(cooldowns: &CooldownSet, match_id: MatchId) {
    cooldowns.mark(match_id);
}

/// Allocation parameters for standing up a fresh match on an idle
/// broadcaster (spec §4.6).
pub struct AllocationRequest {
    pub mode: Symbol,
    pub level: Symbol,
    pub channel: ChannelId,
    pub max_size: i32,
    pub spawned_by: UserId,
}

/// Serializes allocation attempts process-wide: two requests racing for the
/// same idle broadcaster pool must not both succeed against it.
#[derive(Default)]
pub struct Allocator {
    lock: Mutex<()>,
}

impl Allocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds an idle broadcaster serving `request.channel`, claims it by
    /// issuing `MatchCreate`, and returns the freshly-minted label. Holds the
    /// allocation mutex for the whole find-then-claim sequence so no other
    /// caller can observe the same broadcaster as idle in between.
    ///
    /// `idle_broadcasters` must already be ranked best-first by the caller
    /// (the unassigned-lobby query of [`crate::query::build_unassigned_query`]
    /// plus [`crate::search::match_sort`], spec §4.6 steps 2-3) — this method
    /// only enforces the mutual-exclusion and channel-eligibility steps (4-5),
    /// taking the first eligible entry in whatever order it's handed.
    pub async fn allocate(
        &self,
        registry: &dyn MatchRegistry,
        idle_broadcasters: Vec<Broadcaster>,
        request: AllocationRequest,
    ) -> CoreResult<MatchLabel> {
        let _guard = self.lock.lock();

        let broadcaster = idle_broadcasters
            .into_iter()
            .find(|b| b.channels.is_empty() || b.channels.contains(&request.channel))
            .ok_or(CoreError::NoAvailableServers)?;

        let label = MatchLabel {
            match_id: MatchId::new_v4(),
            lobby_type: LobbyType::Public,
            mode: request.mode,
            level: request.level,
            broadcaster,
            channel: request.channel,
            size: 0,
            max_size: request.max_size,
            open: true,
            team_index: TeamIndex::Unassigned,
            spawned_by: request.spawned_by,
        };

        registry.match_create(&label).await?;
        self.signal_start_session(registry, &label).await?;
        Ok(label)
    }

    /// Pushes the `StartSession` control frame to the broadcaster just
    /// claimed for `label`, matching `evr_matchmaker.go`'s
    /// `SignalMatch(ctx, matchRegistry, parkingMatchId, SignalStartSession,
    /// label)` call: at allocation time the match has no entrants yet, so
    /// the frame carries the label's mode/level settings and an empty
    /// entrant list — entrants are added later as each player's own join
    /// completes.
    async fn signal_start_session(&self, registry: &dyn MatchRegistry, label: &MatchLabel) -> CoreResult<()> {
        let settings = StartSessionSettings {
            mode: token_of(label.mode),
            level: token_of(label.level),
        };
        let settings_json = serde_json::to_string(&settings)
            .map_err(|e| CoreError::Internal(format!("failed to encode start session settings: {e}")))?;

        let frame = StartSessionFrame {
            match_id: label.match_id,
            channel: label.channel,
            player_limit: label.max_size as u8,
            lobby_type: label.lobby_type,
            settings_json,
            entrants: Vec::new(),
        };

        let mut payload = BytesMut::new();
        let mut codec = StartSessionCodec;
        codec.encode(frame, &mut payload)?;

        registry.match_signal(&label.match_id, payload.to_vec()).await
    }
}

/// `{mode, level}` — the JSON settings blob carried in a `StartSession`
/// frame's variable body (spec §6).
#[derive(Serialize)]
struct StartSessionSettings {
    mode: String,
    level: String,
}
