//! Friends and blacklist.
//!
//! Relations live on the character and are saved with it. A friendship has
//! two halves, one per character; deleting it reaches the other half
//! wherever that character is: on this channel, on another channel through
//! the directory, or in storage when it is offline. The directory is best
//! effort, so every remote step has a local fallback.

use std::collections::HashMap;
use std::sync::Arc;

use realmforge_protocol::client::{BlacklistAddPacket, BlacklistDeletePacket, FriendDeletePacket};
use realmforge_protocol::server::{BlinitItem, BlinitPacket, FinfoPacket, FinitItem, FinitPacket};
use realmforge_protocol::{RelationType, VisualId};
use realmforge_session::{Character, CharacterRelation, Session};

use crate::GameContext;
use crate::directory::{self, RelationEvent};
use crate::language::LanguageKey;

fn is_friendship(relation: &CharacterRelation) -> bool {
    matches!(relation.relation_type, RelationType::Friend | RelationType::Spouse)
}

/// Characters online on other channels; empty when the directory fails.
fn online_elsewhere(ctx: &GameContext) -> HashMap<VisualId, u32> {
    directory::connected_elsewhere(ctx.directory.as_ref(), ctx.channel_id).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "channel directory unavailable, using local presence only");
        HashMap::new()
    })
}

// ---------------------------------------------------------------------------
// List packets
// ---------------------------------------------------------------------------

pub(super) fn finit(ctx: &GameContext, character: &Character) -> FinitPacket {
    let friends: Vec<CharacterRelation> = character
        .relations()
        .into_iter()
        .filter(is_friendship)
        .collect();
    let remote = if friends.is_empty() {
        HashMap::new()
    } else {
        online_elsewhere(ctx)
    };
    FinitPacket {
        friends: friends
            .into_iter()
            .map(|r| FinitItem {
                character_id: r.related,
                relation_type: r.relation_type,
                is_connected: ctx.session_of(r.related).is_some() || remote.contains_key(&r.related),
                name: r.related_name,
            })
            .collect(),
    }
}

pub(super) fn blinit(character: &Character) -> BlinitPacket {
    BlinitPacket {
        blocked: character
            .relations_of(RelationType::Blocked)
            .into_iter()
            .map(|r| BlinitItem {
                character_id: r.related,
                name: r.related_name,
            })
            .collect(),
    }
}

/// Tells the friends of `character` that it came online or went offline.
pub(super) fn announce_status(ctx: &GameContext, character: &Character, connected: bool) {
    let friends: Vec<VisualId> = character
        .relations()
        .iter()
        .filter(|r| is_friendship(r))
        .map(|r| r.related)
        .collect();
    if friends.is_empty() {
        return;
    }

    let mut elsewhere = None;
    for friend in friends {
        if let Some(session) = ctx.session_of(friend) {
            session.send(&FinfoPacket {
                character_id: character.visual_id,
                is_connected: connected,
            });
            continue;
        }
        let elsewhere = elsewhere.get_or_insert_with(|| online_elsewhere(ctx));
        if let Some(channel) = elsewhere.get(&friend) {
            let event = RelationEvent::FriendStatus {
                character: character.visual_id,
                to: friend,
                connected,
            };
            if let Err(e) = ctx.directory.post_relation_event(*channel, event) {
                tracing::warn!(channel, %friend, error = %e, "friend status not delivered");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Blacklist
// ---------------------------------------------------------------------------

/// Name of a character who may not be online here.
fn lookup_name(ctx: &GameContext, id: VisualId) -> Option<String> {
    if let Some(character) = ctx.session_of(id).as_ref().and_then(|s| s.character().cloned()) {
        return Some(character.name.clone());
    }
    match ctx.store.load(id) {
        Ok(record) => Some(record.name),
        Err(e) => {
            tracing::debug!(%id, error = %e, "character name lookup failed");
            None
        }
    }
}

/// `blins <id>`
pub(super) fn blacklist_add(ctx: &GameContext, session: &Arc<Session>, packet: BlacklistAddPacket) {
    let Some(character) = session.character() else {
        return;
    };
    let target = packet.character_id;
    if target == character.visual_id {
        ctx.notify(session, LanguageKey::CannotBlacklistSelf, &[]);
        return;
    }
    let Some(name) = lookup_name(ctx, target) else {
        ctx.notify(session, LanguageKey::CharacterNotFound, &[]);
        return;
    };

    if character.add_relation(CharacterRelation::new(target, &name, RelationType::Blocked)) {
        tracing::debug!(visual_id = %character.visual_id, %target, "blacklist entry added");
        ctx.inform(session, LanguageKey::BlacklistAdded, &[name.as_str()]);
        session.send(&blinit(character));
    } else {
        ctx.notify(session, LanguageKey::AlreadyBlacklisted, &[name.as_str()]);
    }
}

/// `bldel <id>`
pub(super) fn blacklist_delete(
    ctx: &GameContext,
    session: &Arc<Session>,
    packet: BlacklistDeletePacket,
) {
    let Some(character) = session.character() else {
        return;
    };
    match character.remove_relation(packet.character_id, RelationType::Blocked) {
        Some(relation) => {
            ctx.inform(session, LanguageKey::BlacklistRemoved, &[relation.related_name.as_str()]);
            session.send(&blinit(character));
        }
        None => {
            tracing::debug!(visual_id = %character.visual_id, target = %packet.character_id, "not on the blacklist");
        }
    }
}

// ---------------------------------------------------------------------------
// Friends
// ---------------------------------------------------------------------------

/// `fdel <id>`: ends a friendship on both sides.
pub(super) fn friend_delete(ctx: &GameContext, session: &Arc<Session>, packet: FriendDeletePacket) {
    let Some(character) = session.character() else {
        return;
    };
    let friend = packet.character_id;
    let Some(relation) = character.remove_relation(friend, RelationType::Friend) else {
        ctx.notify(session, LanguageKey::NotAFriend, &[]);
        return;
    };

    delete_other_half(ctx, character, friend);
    session.send(&finit(ctx, character));
    ctx.inform(session, LanguageKey::FriendDeleted, &[relation.related_name.as_str()]);
    tracing::info!(visual_id = %character.visual_id, %friend, "friendship deleted");
}

fn delete_other_half(ctx: &GameContext, character: &Character, friend: VisualId) {
    let event = RelationEvent::FriendDeleted {
        from: character.visual_id,
        to: friend,
    };
    if apply_relation_event(ctx, &event) {
        return;
    }

    match directory::locate(ctx.directory.as_ref(), ctx.channel_id, friend) {
        Ok(Some(channel)) => match ctx.directory.post_relation_event(channel, event) {
            Ok(()) => return,
            Err(e) => tracing::warn!(channel, %friend, error = %e, "friend deletion not delivered, editing storage"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(%friend, error = %e, "channel directory unavailable, editing storage"),
    }

    // Offline, or unreachable: edit the stored record.
    let stored = match ctx.store.load(friend) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(%friend, error = %e, "friend record load failed");
            return;
        }
    };
    let halves = stored
        .relations
        .iter()
        .filter(|r| r.related == character.visual_id && r.relation_type == RelationType::Friend);
    for half in halves {
        if let Err(e) = ctx.store.delete_relation(half.id) {
            tracing::warn!(%friend, relation_id = %half.id, error = %e, "relation delete failed");
        }
    }
}

/// Applies a relation event to a character playing on this channel.
///
/// Returns `false` when the recipient isn't online here. Other channels'
/// events arrive through this function too.
pub fn apply_relation_event(ctx: &GameContext, event: &RelationEvent) -> bool {
    let Some(session) = ctx.session_of(event.recipient()) else {
        return false;
    };
    let Some(character) = session.character() else {
        return false;
    };
    match *event {
        RelationEvent::FriendDeleted { from, .. } => {
            if let Some(relation) = character.remove_relation(from, RelationType::Friend) {
                session.send(&finit(ctx, character));
                ctx.inform(&session, LanguageKey::FriendDeleted, &[relation.related_name.as_str()]);
            }
        }
        RelationEvent::FriendStatus {
            character: friend,
            connected,
            ..
        } => session.send(&FinfoPacket {
            character_id: friend,
            is_connected: connected,
        }),
    }
    true
}
