//! Backfill cooldown set (spec §3, §5): a match that was just offered as a
//! backfill candidate and declined is placed in cooldown for
//! [`DEFAULT_COOLDOWN_DURATION`] before it may be offered again, preventing
//! the allocator from hammering the same idle lobby. Grounded on
//! `tunnel/mod.rs`'s keep-alive sweep pattern (a background tokio task that
//! periodically purges expired entries from a shared map).

use crate::types::MatchId;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio::time::interval;

/// How long a match sits out of backfill candidacy after being skipped
/// (spec §5), absent an operator-configured override.
pub const DEFAULT_COOLDOWN_DURATION: Duration = Duration::from_secs(3);

/// How often the sweeper purges expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct CooldownSet {
    entries: DashMap<MatchId, Instant>,
    cooldown_duration: Duration,
}

impl CooldownSet {
    pub fn new() -> Self {
        Self::with_duration(DEFAULT_COOLDOWN_DURATION)
    }

    /// As [`CooldownSet::new`], but with the cooldown duration read from
    /// operator configuration instead of the built-in default.
    pub fn with_duration(cooldown_duration: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            cooldown_duration,
        }
    }

    /// Places `match_id` into cooldown starting now.
    pub fn mark(&self, match_id: MatchId) {
        self.entries.insert(match_id, Instant::now());
    }

    /// True if `match_id` is still cooling down.
    pub fn is_cooling(&self, match_id: &MatchId) -> bool {
        match self.entries.get(match_id) {
            Some(since) => since.elapsed() < self.cooldown_duration,
            None => false,
        }
    }

    /// Drops every entry whose cooldown has elapsed. Called by the
    /// background sweeper; exposed directly for tests.
    pub fn sweep(&self) {
        self.entries
            .retain(|_, since| since.elapsed() < self.cooldown_duration);
    }

    /// Spawns the periodic sweeper task. Returns a handle the owner may abort
    /// on shutdown.
    pub fn spawn_sweeper(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                self.sweep();
            }
        })
    }
}
