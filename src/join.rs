//! Join coordinator (spec §4.7): validates and records a player's entry into
//! a match, mapping every rejection reason onto the shared [`CoreError`]
//! taxonomy. Grounded on
//! `PocketRelay-Server/src/services/sessions/mod.rs`'s
//! add-then-index-then-notify sequencing, generalized from a single session
//! map to the session/user/evr_id triad.

use crate::collaborators::{ChatPlatform, JoinAttemptOutcome, MatchRegistry, Storage};
use crate::error::{CoreError, CoreResult};
use crate::model::{MatchLabel, TeamIndex};
use crate::registry::SessionIndex;
use crate::suspension::check_suspension;
use crate::types::{EvrId, MatchId, NodeId, SessionId, UserId};
use chrono::Utc;
use uuid::Uuid;

/// `{node, user_id, session_id, username, display_name, evr_id,
/// player_session, team_index, discord_id, query}` (spec §4.7 step 4): the
/// full metadata bundle `JoinEvrMatch` hands to the external registry's
/// `JoinAttempt`. `discord_id` is `None` when the chat platform lookup
/// failed or the player has no linked account — that failure is logged
/// upstream and must not block the join (spec §4.7 step 3: "errors logged
/// but non-fatal").
pub struct PlayerPresence {
    pub node: NodeId,
    pub user: UserId,
    pub session: SessionId,
    pub username: String,
    pub display_name: String,
    pub evr_id: EvrId,
    pub player_session: Uuid,
    pub team_index: TeamIndex,
    pub discord_id: Option<String>,
    pub query: String,
}

impl PlayerPresence {
    /// Builds the bundle for a fresh join attempt; `player_session` is
    /// always freshly minted (spec §4.7 step 4: `player_session = new UUID`).
    pub fn new(
        node: NodeId,
        user: UserId,
        session: SessionId,
        username: String,
        display_name: String,
        evr_id: EvrId,
        team_index: TeamIndex,
        discord_id: Option<String>,
        query: String,
    ) -> Self {
        Self {
            node,
            user,
            session,
            username,
            display_name,
            evr_id,
            player_session: Uuid::new_v4(),
            team_index,
            discord_id,
            query,
        }
    }
}

/// Normalizes a raw match id string to its qualified `"<uuid>.<node>"` form,
/// appending the local node if the caller didn't already qualify it (spec
/// §4.7 step 1), then parses the UUID portion.
pub fn normalize_match_id(match_id_str: &str, local_node: &NodeId) -> CoreResult<(MatchId, String)> {
    let (uuid_part, qualified) = match match_id_str.split_once('.') {
        Some((uuid_part, _node)) => (uuid_part, match_id_str.to_string()),
        None => (match_id_str, format!("{match_id_str}.{local_node}")),
    };

    let match_id = uuid_part
        .parse::<Uuid>()
        .map_err(|e| CoreError::InvalidArgument(format!("bad match id: {e}")))?;

    Ok((match_id, qualified))
}

/// Attempts to join `player` into `match_id`. Holds no lock of its own
/// beyond what [`MatchRegistry`] and [`SessionIndex`] already provide;
/// callers needing exclusivity across a whole allocation/backfill decision
/// should hold that higher-level lock themselves.
pub async fn join_match(
    registry: &dyn MatchRegistry,
    storage: &dyn Storage,
    chat: &dyn ChatPlatform,
    sessions: &SessionIndex,
    match_id: MatchId,
    player: PlayerPresence,
) -> CoreResult<MatchLabel> {
    if sessions.match_by_session(&player.session) == Some(match_id) {
        return Err(CoreError::AlreadyExists);
    }

    let channel = registry
        .match_get(&match_id)
        .await?
        .ok_or(CoreError::NotFound)?
        .channel;

    let suspensions = check_suspension(chat, storage, &player.user, &channel, Utc::now()).await?;
    if !suspensions.is_empty() {
        return Err(CoreError::PermissionDenied);
    }

    let label = match registry.join_attempt(&match_id, player.team_index).await? {
        JoinAttemptOutcome::Joined(label) => label,
        JoinAttemptOutcome::NotFound => return Err(CoreError::NotFound),
        JoinAttemptOutcome::UnassignedLobby => return Err(CoreError::FailedPrecondition),
        JoinAttemptOutcome::NotModerator => return Err(CoreError::PermissionDenied),
        JoinAttemptOutcome::LobbyFull => return Err(CoreError::ResourceExhausted),
    };

    sessions.insert(player.session, player.user, player.evr_id, match_id);

    Ok(label)
}

/// Removes a player from whatever match they're indexed under, decrementing
/// that match's size. A no-op if the player isn't indexed (already left).
pub async fn leave_match(
    registry: &dyn MatchRegistry,
    sessions: &SessionIndex,
    session: SessionId,
    user: UserId,
    evr_id: EvrId,
) -> CoreResult<()> {
    let Some(match_id) = sessions.match_by_session(&session) else {
        return Ok(());
    };

    sessions.remove_all(&session, &user, &evr_id);

    if let Some(mut label) = registry.match_get(&match_id).await? {
        label.size = (label.size - 1).max(0);
        registry.match_update(&label).await?;
    }

    Ok(())
}
