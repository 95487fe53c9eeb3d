//! `StartSession` broadcaster control frame (spec §6): the binary message
//! sent to a broadcaster telling it which match to stand up, who's allowed
//! in, and with what settings. Byte layout, little-endian throughout:
//!
//! ```text
//! match_id        : 16 bytes (uuid)
//! channel         : 16 bytes (uuid)
//! player_limit    : u8
//! entrant_count   : u8
//! lobby_type      : u8   (0 = public, 1 = private, 2 = unassigned)
//! _pad            : u8
//! settings_len    : u32  (length of the JSON settings blob that follows)
//! settings        : settings_len bytes, UTF-8 JSON {"appid","gametype","level"}
//! entrants[entrant_count], 40 bytes each:
//!   unk0          : 16 bytes (uuid)
//!   platform_code : i64
//!   account_id    : u64
//!   flags         : u64  (defaults to 0x0000_0044_BB80_0000 when unset)
//! ```
//!
//! Entrant descriptors are fixed-size, not length-prefixed: a player's id is
//! a platform code plus a numeric account id, not a string, matching
//! `broadcaster_session_start.go`'s `EntrantDescriptor{Unk0, PlayerId: EvrId{
//! PlatformCode, AccountId}, Flags}` streamed as four little-endian fields.
//!
//! Grounded on `tunnel/mod.rs`'s `TunnelCodec`, which implements
//! `tokio_util::codec::{Decoder, Encoder}` over `bytes::{Buf, BufMut}` for a
//! comparable fixed-header-plus-variable-body frame.

use crate::error::CoreError;
use crate::model::LobbyType;
use crate::types::{ChannelId, EvrId, MatchId};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

/// Default entrant flags applied when a caller doesn't override them,
/// matching the original broadcaster protocol's default entrant descriptor.
pub const DEFAULT_ENTRANT_FLAGS: u64 = 0x0000_0044_BB80_0000;

/// Byte size of one entrant descriptor on the wire: uuid(16) + i64(8) +
/// u64(8) + u64(8).
const ENTRANT_LEN: usize = 16 + 8 + 8 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrantDescriptor {
    pub unk0: Uuid,
    pub platform_code: i64,
    pub account_id: u64,
    pub flags: u64,
}

impl EntrantDescriptor {
    pub fn new(platform_code: i64, account_id: u64) -> Self {
        Self {
            unk0: Uuid::new_v4(),
            platform_code,
            account_id,
            flags: DEFAULT_ENTRANT_FLAGS,
        }
    }

    /// Parses an `EvrId` of the form `"<platform_code>-<account_id>"` into an
    /// entrant descriptor (spec §6 glossary: evr ids are rendered this way
    /// everywhere outside this wire frame).
    pub fn from_evr_id(evr_id: &EvrId) -> Result<Self, CoreError> {
        let (platform_code, account_id) = parse_evr_id(evr_id)?;
        Ok(Self::new(platform_code, account_id))
    }

    pub fn player_id(&self) -> EvrId {
        format_evr_id(self.platform_code, self.account_id)
    }
}

fn parse_evr_id(evr_id: &EvrId) -> Result<(i64, u64), CoreError> {
    let (platform_code, account_id) = evr_id
        .split_once('-')
        .ok_or_else(|| CoreError::InvalidArgument(format!("malformed evr id: {evr_id}")))?;
    let platform_code = platform_code
        .parse::<i64>()
        .map_err(|e| CoreError::InvalidArgument(format!("bad evr id platform code: {e}")))?;
    let account_id = account_id
        .parse::<u64>()
        .map_err(|e| CoreError::InvalidArgument(format!("bad evr id account id: {e}")))?;
    Ok((platform_code, account_id))
}

fn format_evr_id(platform_code: i64, account_id: u64) -> EvrId {
    format!("{platform_code}-{account_id}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSessionFrame {
    pub match_id: MatchId,
    pub channel: ChannelId,
    pub player_limit: u8,
    pub lobby_type: LobbyType,
    pub settings_json: String,
    pub entrants: Vec<EntrantDescriptor>,
}

fn lobby_type_byte(lobby_type: LobbyType) -> u8 {
    match lobby_type {
        LobbyType::Public => 0,
        LobbyType::Private => 1,
        LobbyType::Unassigned => 2,
    }
}

fn lobby_type_from_byte(byte: u8) -> Result<LobbyType, CoreError> {
    match byte {
        0 => Ok(LobbyType::Public),
        1 => Ok(LobbyType::Private),
        2 => Ok(LobbyType::Unassigned),
        other => Err(CoreError::Internal(format!(
            "invalid lobby_type byte {other}"
        ))),
    }
}

/// `Decoder`/`Encoder` for [`StartSessionFrame`] over a length-delimited
/// byte stream, mirroring `TunnelCodec`'s split between header parsing and
/// body assembly.
#[derive(Default)]
pub struct StartSessionCodec;

impl Encoder<StartSessionFrame> for StartSessionCodec {
    type Error = CoreError;

    fn encode(&mut self, frame: StartSessionFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if frame.entrants.len() > u8::MAX as usize {
            return Err(CoreError::InvalidArgument(
                "too many entrants for a single frame".to_string(),
            ));
        }

        dst.put_slice(frame.match_id.as_bytes());
        dst.put_slice(frame.channel.as_bytes());
        dst.put_u8(frame.player_limit);
        dst.put_u8(frame.entrants.len() as u8);
        dst.put_u8(lobby_type_byte(frame.lobby_type));
        dst.put_u8(0); // pad

        let settings_bytes = frame.settings_json.as_bytes();
        dst.put_u32_le(settings_bytes.len() as u32);
        dst.put_slice(settings_bytes);

        for entrant in &frame.entrants {
            dst.put_slice(entrant.unk0.as_bytes());
            dst.put_i64_le(entrant.platform_code);
            dst.put_u64_le(entrant.account_id);
            dst.put_u64_le(entrant.flags);
        }

        Ok(())
    }
}

const FIXED_HEADER_LEN: usize = 16 + 16 + 1 + 1 + 1 + 1 + 4;

impl Decoder for StartSessionCodec {
    type Item = StartSessionFrame;
    type Error = CoreError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FIXED_HEADER_LEN {
            return Ok(None);
        }

        let mut cursor = &src[..];
        let match_id = Uuid::from_slice(&cursor[0..16])
            .map_err(|e| CoreError::Internal(format!("bad match_id: {e}")))?;
        let channel = Uuid::from_slice(&cursor[16..32])
            .map_err(|e| CoreError::Internal(format!("bad channel: {e}")))?;
        let player_limit = cursor[32];
        let entrant_count = cursor[33] as usize;
        let lobby_type = lobby_type_from_byte(cursor[34])?;
        // cursor[35] is pad
        cursor.advance(36);
        let settings_len = cursor.get_u32_le() as usize;

        let mut needed = FIXED_HEADER_LEN + settings_len;
        if src.len() < needed {
            return Ok(None);
        }

        let settings_json = String::from_utf8(
            src[FIXED_HEADER_LEN..FIXED_HEADER_LEN + settings_len].to_vec(),
        )
        .map_err(|e| CoreError::Internal(format!("bad settings utf-8: {e}")))?;

        let entrants_len = entrant_count * ENTRANT_LEN;
        if src.len() < needed + entrants_len {
            return Ok(None);
        }

        let mut entrants = Vec::with_capacity(entrant_count);
        let mut offset = needed;
        for _ in 0..entrant_count {
            let unk0 = Uuid::from_slice(&src[offset..offset + 16])
                .map_err(|e| CoreError::Internal(format!("bad entrant unk0: {e}")))?;
            offset += 16;
            let platform_code = i64::from_le_bytes(src[offset..offset + 8].try_into().unwrap());
            offset += 8;
            let account_id = u64::from_le_bytes(src[offset..offset + 8].try_into().unwrap());
            offset += 8;
            let flags = u64::from_le_bytes(src[offset..offset + 8].try_into().unwrap());
            offset += 8;

            entrants.push(EntrantDescriptor {
                unk0,
                platform_code,
                account_id,
                flags,
            });
        }
        needed = offset;

        src.advance(needed);

        Ok(Some(StartSessionFrame {
            match_id,
            channel,
            player_limit,
            lobby_type,
            settings_json,
            entrants,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_frame() -> StartSessionFrame {
        StartSessionFrame {
            match_id: Uuid::new_v4(),
            channel: Uuid::new_v4(),
            player_limit: 8,
            lobby_type: LobbyType::Public,
            settings_json: r#"{"level":"mpl_arena_a"}"#.to_string(),
            entrants: vec![EntrantDescriptor::new(1, 111), EntrantDescriptor::new(1, 222)],
        }
    }

    #[test]
    fn evr_id_round_trips_through_entrant_descriptor() {
        let descriptor = EntrantDescriptor::from_evr_id(&"4-76561199086039035".to_string()).unwrap();
        assert_eq!(descriptor.platform_code, 4);
        assert_eq!(descriptor.account_id, 76561199086039035);
        assert_eq!(descriptor.player_id(), "4-76561199086039035");
    }

    #[test]
    fn malformed_evr_id_is_rejected() {
        assert!(EntrantDescriptor::from_evr_id(&"not-an-evr-id".to_string()).is_err());
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let mut codec = StartSessionCodec;
        let mut buf = BytesMut::new();
        let frame = sample_frame();
        codec.encode(frame.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_returns_none_on_partial_header() {
        let mut codec = StartSessionCodec;
        let mut buf = BytesMut::new();
        buf.put_slice(&[0u8; 10]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_returns_none_until_full_body_arrives() {
        let mut codec = StartSessionCodec;
        let mut full = BytesMut::new();
        codec.encode(sample_frame(), &mut full).unwrap();

        let mut partial = BytesMut::new();
        partial.put_slice(&full[..full.len() - 1]);
        assert_eq!(codec.decode(&mut partial).unwrap(), None);
    }
}
