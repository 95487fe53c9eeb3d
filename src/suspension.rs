//! Suspension gate (spec §4.8): a guild-role-driven ban from matchmaking in
//! a channel. The gate is guarded twice before storage is ever consulted —
//! no guild suspension policy, or no matching role on the player — so the
//! common case never touches the suspension collection at all. Grounded on
//! `PocketRelay-Server/src/services/sessions/mod.rs`'s token-expiry check
//! pattern (compare against `now`, treat stale state as absent) applied to a
//! durable record instead of an in-memory token.

use crate::collaborators::{ChatPlatform, Storage};
use crate::error::CoreResult;
use crate::types::{ChannelId, UserId};
use chrono::{DateTime, Utc};

/// A standing matchmaking ban for one user in one channel, as stored.
#[derive(Debug, Clone)]
pub struct Suspension {
    pub user: UserId,
    pub channel: ChannelId,
    pub reason: String,
    pub imposed_by: UserId,
    pub expires_at: DateTime<Utc>,
}

impl Suspension {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// One suspension as surfaced to a caller deciding whether to allow a join
/// (spec §4.8 step 3/4's `{guild_id, guild_name, user_id, user_chat_id,
/// reason, expiry}` record). `expiry: None` marks the synthetic status
/// returned when a player is role-flagged but storage holds no explicit
/// record for them.
#[derive(Debug, Clone)]
pub struct SuspensionStatus {
    pub guild_id: ChannelId,
    pub guild_name: String,
    pub user: UserId,
    pub user_chat_id: Option<String>,
    pub reason: String,
    pub expiry: Option<DateTime<Utc>>,
}

const UNRECORDED_REASON: &str = "flagged for moderation review; no suspension record on file";

/// Checks whether `user` may matchmake in `channel`. A non-empty result is a
/// hard deny; each entry carries a user-facing reason (spec §4.8).
///
/// Policy, short-circuiting at the first `allow`:
/// 1. No suspension roles configured for the channel's guild → allow.
/// 2. Player holds none of those roles → allow.
/// 3. No suspension record in storage despite the role flag → synthesize one
///    generic status rather than silently allowing a flagged player through.
/// 4. Otherwise return every unexpired record, deleting expired ones as
///    they're found (self-healing cleanup).
pub async fn check_suspension(
    chat: &dyn ChatPlatform,
    storage: &dyn Storage,
    user: &UserId,
    channel: &ChannelId,
    now: DateTime<Utc>,
) -> CoreResult<Vec<SuspensionStatus>> {
    let guild_roles = chat.guild_suspension_roles(channel).await?;
    if guild_roles.is_empty() {
        return Ok(Vec::new());
    }

    let player_roles = chat.user_roles(user, channel).await?;
    if !player_roles.iter().any(|role| guild_roles.contains(role)) {
        return Ok(Vec::new());
    }

    let chat_id = chat.chat_user_id(user).await?;
    let guild_name = chat.guild_name(channel).await?;

    let recorded: Vec<Suspension> = storage
        .read_suspensions(user)
        .await?
        .into_iter()
        .filter(|s| &s.channel == channel)
        .collect();

    if recorded.is_empty() {
        return Ok(vec![SuspensionStatus {
            guild_id: *channel,
            guild_name,
            user: *user,
            user_chat_id: chat_id,
            reason: UNRECORDED_REASON.to_string(),
            expiry: None,
        }]);
    }

    let mut statuses = Vec::new();
    for suspension in recorded {
        if suspension.is_expired(now) {
            storage.delete_suspension(user, channel).await?;
            continue;
        }

        statuses.push(SuspensionStatus {
            guild_id: *channel,
            guild_name: guild_name.clone(),
            user: *user,
            user_chat_id: chat_id.clone(),
            reason: suspension.reason.clone(),
            expiry: Some(suspension.expires_at),
        });
    }

    Ok(statuses)
}

/// Imposes a suspension. Only a channel moderator may call this
/// successfully; the caller's role is checked against the chat platform,
/// not trusted from the request (spec §4.8).
pub async fn impose_suspension(
    chat: &dyn ChatPlatform,
    storage: &dyn Storage,
    moderator: &UserId,
    suspension: Suspension,
) -> CoreResult<()> {
    use crate::error::CoreError;

    if !chat.has_moderator_role(moderator, &suspension.channel).await? {
        return Err(CoreError::PermissionDenied);
    }

    storage.write_suspension(&suspension).await
}
