//! Matchmaker ticket path (spec §4.6 "Matchmaker path"), grounded on
//! `evr_matchmaker.go`'s `MatchMake` ticket-submission flow: combine the
//! player's (and their party's) search query with mode-specific properties,
//! then hand the ticket to the host platform's matchmaker queue.

use crate::collaborators::Matchmaker;
use crate::error::CoreResult;
use crate::model::MSessionTemplate;
use crate::party::{party_id_for_group, PartyRegistry};
use crate::query::build_live_match_query;
use crate::symbol::token_of;
use crate::types::UserId;
use std::collections::HashMap;

/// Fixed capacity for a freshly-created party, independent of the requested
/// match's `max_size` (spec §4.6 "Matchmaker path": "...create one with
/// capacity 8").
const PARTY_CAPACITY: usize = 8;

/// The minimum/maximum number of tickets the matchmaker combines into one
/// match, derived from the template's lobby size once a party is accounted
/// for.
pub struct TicketSizing {
    pub min_count: u32,
    pub max_count: u32,
}

fn ticket_sizing(max_size: i32, party_size: i32) -> TicketSizing {
    let max_count = max_size.max(party_size).max(1) as u32;
    TicketSizing {
        min_count: party_size.max(1) as u32,
        max_count,
    }
}

/// Builds the property bag the matchmaker uses for additional non-boolean
/// matching (mode/level as plain strings, for platforms whose matchmaker
/// can't parse the boolean query language directly).
fn ticket_properties(template: &MSessionTemplate) -> HashMap<String, String> {
    let mut props = HashMap::new();
    props.insert("mode".to_string(), token_of(template.mode));
    props.insert("lobby_type".to_string(), format!("{:?}", template.lobby_type));
    props
}

/// Submits a matchmaking ticket for `user`, first joining them into their
/// party's registry entry (so the party's combined size is known) and
/// deriving the party id deterministically from `group_id` when present.
pub async fn submit_ticket(
    matchmaker: &dyn Matchmaker,
    parties: &PartyRegistry,
    user: UserId,
    group_id: Option<&str>,
    template: &MSessionTemplate,
    max_size: i32,
) -> CoreResult<String> {
    let party_size = if let Some(group_id) = group_id {
        let party = party_id_for_group(group_id);
        let (size, _joined) = parties.join_if_space(party, user, PARTY_CAPACITY);
        size as i32
    } else {
        1
    };

    let query = build_live_match_query(template, max_size);
    let properties = ticket_properties(template);
    let sizing = ticket_sizing(max_size, party_size);

    matchmaker
        .submit_ticket(&query, &properties, sizing.min_count, sizing.max_count)
        .await
}
