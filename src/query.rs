//! Boolean query builder for live-match search and unassigned-lobby search
//! (spec §4.2), grounded on `evr_matchmaker.go`'s `buildMatchQueryFromLabel`
//! and `ListUnassignedLobbies`.

use crate::model::{LobbyType, MatchLabel, MSessionTemplate, TeamIndex};
use crate::symbol::Symbol;
use crate::types::{ChannelId, MatchId};
use std::fmt::Write as _;

/// A single clause of the boolean query language.
enum Clause {
    /// `+field:value` — required, omission disqualifies.
    Must(String),
    /// `-field:value` — required absent.
    MustNot(String),
    /// `field:value^boost` — optional, contributes score.
    Should(String, u32),
}

impl Clause {
    fn render(&self, out: &mut String) {
        match self {
            Clause::Must(part) => {
                let _ = write!(out, "+{part}");
            }
            Clause::MustNot(part) => {
                let _ = write!(out, "-{part}");
            }
            Clause::Should(part, boost) => {
                let _ = write!(out, "{part}^{boost}");
            }
        }
    }
}

/// Accumulates clauses and renders the final query string, space-joined in
/// insertion order.
#[derive(Default)]
pub struct QueryBuilder {
    clauses: Vec<Clause>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(&mut self, field: &str, value: impl std::fmt::Display) -> &mut Self {
        self.clauses.push(Clause::Must(format!("{field}:{value}")));
        self
    }

    pub fn must_raw(&mut self, expr: impl Into<String>) -> &mut Self {
        self.clauses.push(Clause::Must(expr.into()));
        self
    }

    pub fn must_not(&mut self, field: &str, value: impl std::fmt::Display) -> &mut Self {
        self.clauses
            .push(Clause::MustNot(format!("{field}:{value}")));
        self
    }

    pub fn should(&mut self, field: &str, value: impl std::fmt::Display, boost: u32) -> &mut Self {
        self.clauses
            .push(Clause::Should(format!("{field}:{value}"), boost));
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::new();
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            clause.render(&mut out);
        }
        out
    }
}

/// Computes the maximum seats a party may occupy in a candidate lobby: the
/// lobby's own seats, less the player's party size, bounded to at least 1 so
/// a lone player can always find room.
fn max_seats_for_party(party_size: i32, max_size: i32) -> i32 {
    (max_size - party_size.max(1) + 1).max(1)
}

/// Builds the live-match search query (spec §4.2, first builder).
pub fn build_live_match_query(template: &MSessionTemplate, max_size: i32) -> String {
    let mut q = QueryBuilder::new();

    q.must("open", true);
    q.must("lobby_type", lobby_type_token(template.lobby_type));
    q.must("mode", template.mode.0);

    if !template.team_index.is_spectator_or_moderator() {
        q.must_raw(format!(
            "size:<={}",
            max_seats_for_party(template.party_size, max_size)
        ));
    }

    if let Some(excluded) = template.excluded_match {
        q.must_not("match_id", excluded);
    }

    if !template.accessible_channels.is_empty() {
        q.must_raw(channel_in_clause(&template.accessible_channels));
    }

    q.should("channel", template.channel, 3);

    if let Some(region) = template.region {
        if !region.is_none() {
            q.should("region", region.0, 2);
        }
    }

    q.build()
}

/// Builds the live-match query directly from an existing label (used by the
/// join-grace/backfill path when re-deriving a query from a match already in
/// progress), mirroring `buildMatchQueryFromLabel`.
pub fn build_live_match_query_from_label(label: &MatchLabel) -> String {
    let mut q = QueryBuilder::new();

    q.must("open", true);
    q.must("lobby_type", lobby_type_token(label.lobby_type));
    q.must("mode", label.mode.0);

    if !matches!(label.team_index, TeamIndex::Spectator | TeamIndex::Moderator) {
        q.must_raw(format!("size:<={}", label.size));
    }

    if label.match_id != MatchId::nil() {
        q.must_not("match_id", label.match_id);
    }

    if !label.broadcaster.channels.is_empty() {
        let channels: Vec<ChannelId> = label.broadcaster.channels.iter().copied().collect();
        q.must_raw(channel_in_clause(&channels));
    }

    if label.channel != ChannelId::nil() {
        q.should("channel", label.channel, 3);
    }

    if !label.broadcaster.region.is_none() {
        q.should("region", label.broadcaster.region.0, 2);
    }

    q.build()
}

/// Builds the unassigned-lobby allocation query (spec §4.2, second builder).
pub fn build_unassigned_query(accessible_channels: &[ChannelId], region: Option<Symbol>) -> String {
    let mut q = QueryBuilder::new();

    q.must("lobby_type", lobby_type_token(LobbyType::Unassigned));

    if !accessible_channels.is_empty() {
        q.must_raw(channel_in_clause(accessible_channels));

        let n = accessible_channels.len();
        for (i, channel) in accessible_channels.iter().enumerate() {
            q.should("channel", channel, (n - i) as u32);
        }
    }

    if let Some(region) = region {
        if !region.is_none() {
            q.should("region", region.0, 3);
        }
    }

    q.build()
}

fn lobby_type_token(lobby_type: LobbyType) -> &'static str {
    match lobby_type {
        LobbyType::Public => "public",
        LobbyType::Private => "private",
        LobbyType::Unassigned => "unassigned",
    }
}

fn channel_in_clause(channels: &[ChannelId]) -> String {
    let joined = channels
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("channel:({joined})")
}
