//! Live-match search ranking (spec §4.5), grounded on `evr_matchmaker.go`'s
//! `MatchSearch`/`MatchSort`/`RTTweightedPopulationCmp`/`PopulationCmp`.

use crate::collaborators::MatchRegistry;
use crate::error::CoreResult;
use crate::latency::{ping_endpoints_configured, LatencyCache, PingTransport, DEFAULT_PING_DEADLINE};
use crate::model::MatchLabel;
use crate::query::build_live_match_query;
use crate::registry::BroadcasterRegistry;
use crate::symbol::Symbol;
use crate::symbol_table::mode_arena_public;
use crate::types::{RttMillis, UserId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Latency below which two Arena Public candidates are considered
/// interchangeable and ranked by population instead (spec §4.5), absent an
/// operator-configured override.
pub const DEFAULT_ARENA_RTT_THRESHOLD_MS: RttMillis = 90;

/// Matches above this RTT are treated as unreachable and dropped from sort
/// output (spec §4.5, §8 property 2).
const MAX_RANKABLE_RTT_MS: RttMillis = 270;

/// A live-match search hit: the label plus the searching player's measured
/// RTT to that match's broadcaster, if any.
pub struct Candidate {
    pub label: MatchLabel,
    pub rtt: Option<RttMillis>,
}

/// Missing RTT sorts last, matching "never measured" being worse than any
/// measured value including 0 (spec §9).
fn rtt_rank(rtt: Option<RttMillis>) -> RttMillis {
    rtt.unwrap_or(RttMillis::MAX)
}

fn size_desc_then_rtt_asc(a: &Candidate, b: &Candidate) -> Ordering {
    b.label
        .size
        .cmp(&a.label.size)
        .then_with(|| rtt_rank(a.rtt).cmp(&rtt_rank(b.rtt)))
}

/// Arena Public's comparator: below the threshold, RTT differences don't
/// matter and population dominates; once either side crosses the threshold,
/// the lower-RTT match wins outright (spec §4.5, §8 scenario S2).
fn arena_public_cmp(a: &Candidate, b: &Candidate, threshold: RttMillis) -> Ordering {
    let a_under = rtt_rank(a.rtt) < threshold;
    let b_under = rtt_rank(b.rtt) < threshold;

    match (a_under, b_under) {
        (true, true) => size_desc_then_rtt_asc(a, b),
        (false, false) => rtt_rank(a.rtt)
            .cmp(&rtt_rank(b.rtt))
            .then_with(|| b.label.size.cmp(&a.label.size)),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
    }
}

/// Selects the comparator for `mode` and stably sorts `candidates` best-first
/// in place, using the default Arena Public threshold.
pub fn rank_candidates(mode: Symbol, candidates: &mut [Candidate]) {
    rank_candidates_configured(mode, candidates, DEFAULT_ARENA_RTT_THRESHOLD_MS)
}

/// As [`rank_candidates`], but with the Arena Public threshold read from
/// operator configuration instead of the built-in default.
pub fn rank_candidates_configured(mode: Symbol, candidates: &mut [Candidate], arena_rtt_threshold_ms: RttMillis) {
    if mode == mode_arena_public() {
        candidates.sort_by(|a, b| arena_public_cmp(a, b, arena_rtt_threshold_ms));
    } else {
        candidates.sort_by(size_desc_then_rtt_asc);
    }
}

/// Drops candidates that can't be joined at all: unreachable (never
/// measured, or measured and timed out) or beyond the usable RTT ceiling
/// (spec §4.5 step 2, §8 property 2: every label `MatchSort` returns has
/// `0 < rtt ≤ 270 ms`). A legitimate `Some(0)` reading is reachability, not
/// unreachability, but still fails the strict `0 <` bound the same as a
/// missing reading, so both are dropped here.
fn filter_reachable(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| matches!(c.rtt, Some(rtt) if rtt > 0 && rtt <= MAX_RANKABLE_RTT_MS))
        .collect()
}

/// `MatchSort(msession, labels)` (spec §4.5): pings every distinct
/// broadcaster endpoint among `labels`, drops unreachable/out-of-range
/// candidates, and returns the rest stably sorted best-first for `mode`,
/// using the default Arena Public threshold, ping deadline, and an
/// uncancellable probe.
pub async fn match_sort(
    transport: Arc<dyn PingTransport>,
    broadcasters: &BroadcasterRegistry,
    cache: &LatencyCache,
    user: UserId,
    mode: Symbol,
    labels: Vec<MatchLabel>,
) -> CoreResult<Vec<Candidate>> {
    match_sort_configured(
        transport,
        broadcasters,
        cache,
        user,
        mode,
        labels,
        DEFAULT_ARENA_RTT_THRESHOLD_MS,
        DEFAULT_PING_DEADLINE,
        &CancellationToken::new(),
    )
    .await
}

/// As [`match_sort`], but with the Arena Public threshold, ping deadline, and
/// cancellation source read from the caller instead of built-in defaults.
pub async fn match_sort_configured(
    transport: Arc<dyn PingTransport>,
    broadcasters: &BroadcasterRegistry,
    cache: &LatencyCache,
    user: UserId,
    mode: Symbol,
    labels: Vec<MatchLabel>,
    arena_rtt_threshold_ms: RttMillis,
    ping_deadline: Duration,
    cancellation: &CancellationToken,
) -> CoreResult<Vec<Candidate>> {
    let mut endpoints_by_id = HashMap::new();
    for label in &labels {
        endpoints_by_id
            .entry(label.broadcaster.endpoint.endpoint_id())
            .or_insert_with(|| label.broadcaster.endpoint.clone());
    }
    let endpoints: Vec<_> = endpoints_by_id.into_values().collect();

    let rtts = ping_endpoints_configured(
        transport,
        broadcasters,
        cache,
        user,
        endpoints,
        ping_deadline,
        cancellation,
    )
    .await?;
    let rtt_by_id: HashMap<String, RttMillis> = rtts
        .into_iter()
        .map(|(endpoint, rtt)| (endpoint.endpoint_id(), rtt))
        .collect();

    let candidates = labels
        .into_iter()
        .map(|label| {
            let rtt = rtt_by_id.get(&label.broadcaster.endpoint.endpoint_id()).copied();
            Candidate { label, rtt }
        })
        .collect();

    let mut candidates = filter_reachable(candidates);
    rank_candidates_configured(mode, &mut candidates, arena_rtt_threshold_ms);
    Ok(candidates)
}

/// `MatchSearch(msession)` (spec §4.5): builds the live-match query from the
/// player's template, lists matching labels from the registry, and sorts
/// them via [`match_sort`].
pub async fn match_search(
    registry: &dyn MatchRegistry,
    transport: Arc<dyn PingTransport>,
    broadcasters: &BroadcasterRegistry,
    cache: &LatencyCache,
    user: UserId,
    template: &crate::model::MSessionTemplate,
    max_size: i32,
    limit: usize,
) -> CoreResult<Vec<Candidate>> {
    let query = build_live_match_query(template, max_size);
    let labels = registry.match_list(&query, limit).await?;
    match_sort(transport, broadcasters, cache, user, template.mode, labels).await
}

/// As [`match_search`], but threading the Arena Public threshold, ping
/// deadline, and cancellation source through to [`match_sort_configured`].
#[allow(clippy::too_many_arguments)]
pub async fn match_search_configured(
    registry: &dyn MatchRegistry,
    transport: Arc<dyn PingTransport>,
    broadcasters: &BroadcasterRegistry,
    cache: &LatencyCache,
    user: UserId,
    template: &crate::model::MSessionTemplate,
    max_size: i32,
    limit: usize,
    arena_rtt_threshold_ms: RttMillis,
    ping_deadline: Duration,
    cancellation: &CancellationToken,
) -> CoreResult<Vec<Candidate>> {
    let query = build_live_match_query(template, max_size);
    let labels = registry.match_list(&query, limit).await?;
    match_sort_configured(
        transport,
        broadcasters,
        cache,
        user,
        template.mode,
        labels,
        arena_rtt_threshold_ms,
        ping_deadline,
        cancellation,
    )
    .await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::model::{Broadcaster, LobbyType, TeamIndex};
    use crate::symbol::symbol;
    use crate::symbol_table::mode_combat_public;
    use uuid::Uuid;

    fn label(size: i32) -> MatchLabel {
        MatchLabel {
            match_id: Uuid::new_v4(),
            lobby_type: LobbyType::Public,
            mode: mode_arena_public(),
            level: symbol("mpl_arena_a"),
            broadcaster: Broadcaster::unknown(Endpoint::unknown(), Uuid::new_v4()),
            channel: Uuid::new_v4(),
            size,
            max_size: 8,
            open: true,
            team_index: TeamIndex::Unassigned,
            spawned_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn arena_under_threshold_ranks_by_population_not_rtt() {
        let mut candidates = vec![
            Candidate { label: label(2), rtt: Some(80) },
            Candidate { label: label(6), rtt: Some(10) },
        ];
        rank_candidates(mode_arena_public(), &mut candidates);
        assert_eq!(candidates[0].label.size, 6);
    }

    #[test]
    fn arena_crossing_threshold_prefers_lower_rtt() {
        let mut candidates = vec![
            Candidate { label: label(6), rtt: Some(120) },
            Candidate { label: label(2), rtt: Some(40) },
        ];
        rank_candidates(mode_arena_public(), &mut candidates);
        assert_eq!(candidates[0].label.size, 2);
    }

    #[test]
    fn default_mode_ranks_size_desc_then_rtt_asc() {
        let mut combat_a = label(4);
        combat_a.mode = mode_combat_public();
        let mut combat_b = label(4);
        combat_b.mode = mode_combat_public();

        let mut candidates = vec![
            Candidate { label: combat_a, rtt: Some(100) },
            Candidate { label: combat_b, rtt: Some(20) },
        ];
        rank_candidates(mode_combat_public(), &mut candidates);
        assert_eq!(candidates[0].rtt, Some(20));
    }

    #[test]
    fn filter_reachable_drops_zero_and_over_ceiling() {
        let mut reachable = label(4);
        reachable.mode = mode_combat_public();
        let mut unreachable_zero = label(4);
        unreachable_zero.mode = mode_combat_public();
        let mut too_far = label(4);
        too_far.mode = mode_combat_public();

        let candidates = vec![
            Candidate { label: reachable, rtt: Some(120) },
            Candidate { label: unreachable_zero, rtt: Some(0) },
            Candidate { label: too_far, rtt: Some(271) },
        ];
        let kept = filter_reachable(candidates);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].rtt, Some(120));
    }

    #[test]
    fn filter_reachable_drops_never_measured() {
        let candidates = vec![Candidate { label: label(4), rtt: None }];
        assert!(filter_reachable(candidates).is_empty());
    }

    struct FixedTransport(Option<std::time::Duration>);

    #[async_trait::async_trait]
    impl PingTransport for FixedTransport {
        async fn ping(&self, _endpoint: &crate::endpoint::Endpoint) -> Option<std::time::Duration> {
            self.0
        }
    }

    #[tokio::test]
    async fn match_sort_keeps_reachable_candidates() {
        let broadcasters = BroadcasterRegistry::new();
        let cache = LatencyCache::new();
        let user = Uuid::new_v4();

        let mut reachable = label(4);
        reachable.mode = mode_combat_public();
        reachable.broadcaster = Broadcaster::unknown(Endpoint::new("10.1.0.1", "1.2.3.4", 1000), Uuid::new_v4());

        let transport: Arc<dyn PingTransport> =
            Arc::new(FixedTransport(Some(std::time::Duration::from_millis(44))));

        let sorted = match_sort(
            transport,
            &broadcasters,
            &cache,
            user,
            mode_combat_public(),
            vec![reachable.clone()],
        )
        .await
        .unwrap();

        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].label.match_id, reachable.match_id);
        assert_eq!(sorted[0].rtt, Some(40));
    }

    #[tokio::test]
    async fn match_sort_drops_candidates_that_never_answer() {
        let broadcasters = BroadcasterRegistry::new();
        let cache = LatencyCache::new();
        let user = Uuid::new_v4();

        let mut unreachable = label(4);
        unreachable.mode = mode_combat_public();
        unreachable.broadcaster = Broadcaster::unknown(Endpoint::new("10.1.0.2", "1.2.3.4", 1000), Uuid::new_v4());

        let transport: Arc<dyn PingTransport> = Arc::new(FixedTransport(None));

        let sorted = match_sort(
            transport,
            &broadcasters,
            &cache,
            user,
            mode_combat_public(),
            vec![unreachable],
        )
        .await
        .unwrap();

        assert!(sorted.is_empty());
    }

    #[test]
    fn missing_rtt_sorts_last() {
        let mut with_rtt = label(4);
        with_rtt.mode = mode_combat_public();
        let mut without_rtt = label(4);
        without_rtt.mode = mode_combat_public();

        let mut candidates = vec![
            Candidate { label: without_rtt, rtt: None },
            Candidate { label: with_rtt, rtt: Some(500) },
        ];
        rank_candidates(mode_combat_public(), &mut candidates);
        assert_eq!(candidates[0].rtt, Some(500));
    }
}
