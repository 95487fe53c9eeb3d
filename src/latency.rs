//! Latency probing and per-user RTT cache (spec §3 "Latency cache", §4.4),
//! grounded on `evr_matchmaker.go`'s `PingEndpoints`/`sendPingRequest`/
//! `mroundRTT` and on `tunnel/mod.rs`'s channel-handoff pattern for async
//! I/O results flowing back into a shared registry.
//!
//! The cache is keyed per user (not process-wide): two different players
//! measure different RTTs to the same broadcaster, so each `MSession` owns
//! its own view.

use crate::endpoint::Endpoint;
use crate::error::{CoreError, CoreResult};
use crate::registry::BroadcasterRegistry;
use crate::types::{RttMillis, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Horizon past which a cached latency sample is considered stale (spec
/// §3/§4.4), absent an operator-configured override.
pub const DEFAULT_LATENCY_STALE_AFTER: Duration = Duration::from_secs(60);

/// Hard deadline for a ping round (spec §4.4, §5), absent an
/// operator-configured override.
pub const DEFAULT_PING_DEADLINE: Duration = Duration::from_secs(5);

struct CachedLatency {
    /// `None` when the endpoint has never answered a probe; `Some(0)` is a
    /// distinct, legitimate "measured zero" reading (spec §9) that the cache
    /// must not treat the same as "never measured" when deciding whether to
    /// re-probe.
    rtt: Option<RttMillis>,
    measured_at: Instant,
}

/// Rounds an RTT to the nearest 10ms, half away from zero, mirroring
/// `mroundRTT`.
pub fn mround_rtt(rtt: Duration) -> RttMillis {
    let millis = rtt.as_secs_f64() * 1000.0;
    let rounded = (millis / 10.0).round() * 10.0;
    rounded.max(0.0) as RttMillis
}

/// A raw ping result for one endpoint: `None` means the probe timed out or
/// the endpoint never answered.
struct PingResult {
    endpoint: Endpoint,
    rtt: Option<Duration>,
}

/// The transport used to actually send a ping and await a pong. Kept as a
/// trait so tests can supply a fake without a real broadcaster listening on
/// the endpoint.
#[async_trait]
pub trait PingTransport: Send + Sync {
    async fn ping(&self, endpoint: &Endpoint) -> Option<Duration>;
}

/// Per-user map of endpoint id to cached latency sample.
pub struct LatencyCache {
    by_user: DashMap<UserId, DashMap<String, CachedLatency>>,
    stale_after: Duration,
}

impl LatencyCache {
    pub fn new() -> Self {
        Self::with_stale_after(DEFAULT_LATENCY_STALE_AFTER)
    }

    /// As [`LatencyCache::new`], but with the staleness horizon read from
    /// operator configuration instead of the built-in default.
    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            by_user: DashMap::new(),
            stale_after,
        }
    }

    fn record(&self, user: UserId, endpoint: &Endpoint, rtt: Option<RttMillis>) {
        self.by_user.entry(user).or_default().insert(
            endpoint.endpoint_id(),
            CachedLatency {
                rtt,
                measured_at: Instant::now(),
            },
        );
    }

    /// `Some(Some(rtt))` for a fresh measured sample, `Some(None)` for a
    /// fresh "never answered" sample, `None` if nothing fresh is cached.
    fn sample(&self, user: &UserId, endpoint: &Endpoint) -> Option<Option<RttMillis>> {
        let per_user = self.by_user.get(user)?;
        let entry = per_user.get(&endpoint.endpoint_id())?;
        if entry.measured_at.elapsed() > self.stale_after {
            return None;
        }
        Some(entry.rtt)
    }

    /// `GetLatencies(user_id, endpoints)` (spec §4.3): the subset of
    /// requested endpoints for which a fresh cache entry exists, in the
    /// order provided.
    pub fn get_latencies(&self, user: &UserId, endpoints: &[Endpoint]) -> Vec<(Endpoint, Option<RttMillis>)> {
        endpoints
            .iter()
            .filter_map(|endpoint| {
                self.sample(user, endpoint)
                    .map(|rtt| (endpoint.clone(), rtt))
            })
            .collect()
    }

    fn missing_or_stale<'a>(&self, user: &UserId, endpoints: &'a [Endpoint]) -> Vec<&'a Endpoint> {
        endpoints
            .iter()
            .filter(|endpoint| self.sample(user, endpoint).is_none())
            .collect()
    }
}

/// `PingEndpoints(msession, endpoints)` (spec §4.4): registers any
/// newly-observed endpoints, probes only the stale/missing subset, and
/// returns the cached (post-update) metrics for every requested endpoint in
/// caller order, omitting any still missing. Uses the default ping deadline
/// and an uncancellable probe.
pub async fn ping_endpoints(
    transport: Arc<dyn PingTransport>,
    broadcasters: &BroadcasterRegistry,
    cache: &LatencyCache,
    user: UserId,
    endpoints: Vec<Endpoint>,
) -> CoreResult<Vec<(Endpoint, RttMillis)>> {
    ping_endpoints_configured(
        transport,
        broadcasters,
        cache,
        user,
        endpoints,
        DEFAULT_PING_DEADLINE,
        &CancellationToken::new(),
    )
    .await
}

/// As [`ping_endpoints`], but with the ping deadline read from operator
/// configuration and a cancellation source the caller can trip to abandon an
/// in-flight probe round early (spec "session context cancellation").
pub async fn ping_endpoints_configured(
    transport: Arc<dyn PingTransport>,
    broadcasters: &BroadcasterRegistry,
    cache: &LatencyCache,
    user: UserId,
    endpoints: Vec<Endpoint>,
    ping_deadline: Duration,
    cancellation: &CancellationToken,
) -> CoreResult<Vec<(Endpoint, RttMillis)>> {
    broadcasters.update_broadcasters(&endpoints, user);

    let candidates = cache
        .missing_or_stale(&user, &endpoints)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();

    if !candidates.is_empty() {
        let (tx, mut rx) = mpsc::channel::<PingResult>(candidates.len());

        for endpoint in candidates {
            let transport = transport.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let rtt = transport.ping(&endpoint).await;
                let _ = tx.send(PingResult { endpoint, rtt }).await;
            });
        }
        drop(tx);

        let collect = async {
            while let Some(result) = rx.recv().await {
                let rounded = result.rtt.map(mround_rtt);
                cache.record(user, &result.endpoint, rounded);
            }
        };

        tokio::select! {
            _ = cancellation.cancelled() => return Err(CoreError::Cancelled),
            result = timeout(ping_deadline, collect) => {
                if result.is_err() {
                    return Err(CoreError::PingTimeout);
                }
            }
        }
    }

    Ok(endpoints
        .into_iter()
        .filter_map(|endpoint| {
            cache
                .sample(&user, &endpoint)
                .and_then(|rtt| rtt)
                .map(|rtt| (endpoint, rtt))
        })
        .collect())
}
