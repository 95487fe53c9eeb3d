//! Type aliases that help identify field meaning at a glance, mirroring
//! `PocketRelay-Server/src/utils/types.rs`'s `PlayerID`/`SessionID`/`GameID`
//! aliases.

use uuid::Uuid;

pub type UserId = Uuid;
pub type SessionId = Uuid;
pub type ChannelId = Uuid;
pub type MatchId = Uuid;
pub type EvrId = String;
pub type NodeId = String;
pub type RttMillis = u32;
