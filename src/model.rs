//! Broadcaster and match label data model (spec §3)

use crate::endpoint::Endpoint;
use crate::symbol::Symbol;
use crate::types::{ChannelId, MatchId, UserId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

/// `{lobby_type, mode, level, broadcaster, channel, size, max_size, open,
/// team_index, spawned_by}` — the authoritative per-match document,
/// serialized as JSON into the external match registry's label field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchLabel {
    pub match_id: MatchId,
    pub lobby_type: LobbyType,
    pub mode: Symbol,
    pub level: Symbol,
    pub broadcaster: Broadcaster,
    pub channel: ChannelId,
    pub size: i32,
    pub max_size: i32,
    pub open: bool,
    #[serde(default = "TeamIndex::unassigned")]
    pub team_index: TeamIndex,
    pub spawned_by: UserId,
}

impl MatchLabel {
    /// Validates the invariants of spec §3:
    /// - `0 ≤ size ≤ max_size`
    /// - `lobby_type = Unassigned` implies `level = 0` and `size ≤ 1`
    pub fn validate(&self) -> Result<(), String> {
        if self.size < 0 || self.size > self.max_size {
            return Err(format!(
                "size {} out of range [0, {}]",
                self.size, self.max_size
            ));
        }

        if self.lobby_type == LobbyType::Unassigned {
            if !self.level.is_none() {
                return Err("unassigned lobby must have level = 0".to_string());
            }
            if self.size > 1 {
                return Err("unassigned lobby must have size <= 1".to_string());
            }
        }

        Ok(())
    }
}

/// Lobby access/lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyType {
    Public,
    Private,
    Unassigned,
}

/// Team/role assignment, used transiently in query construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum TeamIndex {
    Unassigned = -1,
    Blue = 0,
    Orange = 1,
    Social = 2,
    Spectator = 3,
    Moderator = 4,
}

impl TeamIndex {
    fn unassigned() -> Self {
        TeamIndex::Unassigned
    }

    pub fn is_spectator_or_moderator(&self) -> bool {
        matches!(self, TeamIndex::Spectator | TeamIndex::Moderator)
    }

    fn from_i8(value: i8) -> Option<Self> {
        match value {
            -1 => Some(TeamIndex::Unassigned),
            0 => Some(TeamIndex::Blue),
            1 => Some(TeamIndex::Orange),
            2 => Some(TeamIndex::Social),
            3 => Some(TeamIndex::Spectator),
            4 => Some(TeamIndex::Moderator),
            _ => None,
        }
    }
}

// Encoded on the wire as its bare discriminant (matches the label's
// `team_index: int` field, spec §3), not as a string variant name.
impl Serialize for TeamIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(*self as i8)
    }
}

impl<'de> Deserialize<'de> for TeamIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i8::deserialize(deserializer)?;
        TeamIndex::from_i8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid team_index {value}")))
    }
}

/// `{endpoint, region, channels, version_lock, operator_user_id}` — a
/// broadcaster's registration record, embedded in the match label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcaster {
    pub endpoint: Endpoint,
    pub region: Symbol,
    pub channels: HashSet<ChannelId>,
    pub version_lock: u64,
    pub operator_user_id: UserId,
}

impl Broadcaster {
    /// A best-effort record for an endpoint observed only via a latency
    /// probe, with unknown region/channel eligibility (spec §4.3
    /// `UpdateBroadcasters`).
    pub fn unknown(endpoint: Endpoint, operator_user_id: UserId) -> Self {
        Self {
            endpoint,
            region: Symbol::NONE,
            channels: HashSet::new(),
            version_lock: 0,
            operator_user_id,
        }
    }
}

/// Per-player ephemeral state created when the player enters matchmaking.
pub struct MSessionTemplate {
    pub lobby_type: LobbyType,
    pub mode: Symbol,
    pub channel: ChannelId,
    pub accessible_channels: Vec<ChannelId>,
    pub region: Option<Symbol>,
    pub team_index: TeamIndex,
    pub party_size: i32,
    pub excluded_match: Option<MatchId>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbol::symbol;
    use uuid::Uuid;

    fn sample_label(lobby_type: LobbyType, size: i32, max_size: i32, level: Symbol) -> MatchLabel {
        MatchLabel {
            match_id: Uuid::new_v4(),
            lobby_type,
            mode: symbol("echo_arena"),
            level,
            broadcaster: Broadcaster::unknown(Endpoint::unknown(), Uuid::new_v4()),
            channel: Uuid::new_v4(),
            size,
            max_size,
            open: true,
            team_index: TeamIndex::Unassigned,
            spawned_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn rejects_size_over_max() {
        let label = sample_label(LobbyType::Public, 5, 4, Symbol::NONE);
        assert!(label.validate().is_err());
    }

    #[test]
    fn unassigned_lobby_requires_no_level_and_size_at_most_one() {
        let bad_level = sample_label(LobbyType::Unassigned, 1, 1, symbol("mpl_arena_a"));
        assert!(bad_level.validate().is_err());

        let bad_size = sample_label(LobbyType::Unassigned, 2, 2, Symbol::NONE);
        assert!(bad_size.validate().is_err());

        let ok = sample_label(LobbyType::Unassigned, 1, 1, Symbol::NONE);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn team_index_round_trips_as_discriminant() {
        let encoded = serde_json::to_string(&TeamIndex::Moderator).unwrap();
        assert_eq!(encoded, "4");
        let decoded: TeamIndex = serde_json::from_str("-1").unwrap();
        assert_eq!(decoded, TeamIndex::Unassigned);
        assert!(serde_json::from_str::<TeamIndex>("7").is_err());
    }
}
