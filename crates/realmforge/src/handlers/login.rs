//! Character selection, map entry and logout.

use std::sync::Arc;

use realmforge_protocol::VisualType;
use realmforge_protocol::client::{AuthPacket, SelectPacket};
use realmforge_protocol::server::{AtPacket, ChangeMapPacket, InPacket, OutPacket};
use realmforge_session::{Character, Session};
use realmforge_world::{InstanceType, MapInstance};

use super::{exchange, relation, shop};
use crate::GameContext;
use crate::language::LanguageKey;

/// `auth` is consumed by the handshake; a second one is noise.
pub(super) fn repeated_auth(_ctx: &GameContext, session: &Arc<Session>, _packet: AuthPacket) {
    tracing::debug!(session_id = %session.id(), "auth after handshake ignored");
}

/// `select <character_id>`: loads the character and puts it in the world.
pub(super) fn select(ctx: &GameContext, session: &Arc<Session>, packet: SelectPacket) {
    let session_id = session.id();
    let character_id = packet.character_id;
    if session.is_in_game() {
        tracing::debug!(%session_id, "character already selected");
        return;
    }
    let Some(account) = session.account() else {
        return;
    };

    let record = match ctx.store.load(character_id) {
        Ok(record) if record.account_id == account.id => record,
        Ok(_) => {
            tracing::warn!(%session_id, %character_id, account_id = %account.id, "character belongs to another account");
            ctx.notify(session, LanguageKey::CharacterNotFound, &[]);
            return;
        }
        Err(e) => {
            tracing::warn!(%session_id, %character_id, error = %e, "character load failed");
            ctx.notify(session, LanguageKey::CharacterNotFound, &[]);
            return;
        }
    };

    // A session still playing this character loses it. Its logout waits
    // for the line that session is handling and saves the latest state, so
    // read the record again afterwards.
    let record = match ctx.session_of(character_id) {
        Some(stale) => {
            ctx.inform(&stale, LanguageKey::LoggedInElsewhere, &[]);
            stale.kick("character selected on another session");
            logout(ctx, &stale);
            ctx.store.load(character_id).unwrap_or(record)
        }
        None => record,
    };

    let character = Arc::new(Character::from_record(record));
    if let Err(e) = session.attach_character(Arc::clone(&character)) {
        tracing::warn!(%session_id, %character_id, error = %e, "character attach failed");
        return;
    }
    ctx.broadcaster.register(Arc::clone(session));

    let position = character.position();
    let Some((instance, x, y)) = arrival(ctx, position.map_id, position.x, position.y) else {
        tracing::error!(%session_id, %character_id, "no map to place the character on");
        return;
    };
    enter_map(ctx, session, &character, &instance, x, y);
    session.send(&relation::finit(ctx, &character));
    session.send(&relation::blinit(&character));
    relation::announce_status(ctx, &character, true);

    tracing::info!(
        %session_id,
        visual_id = %character.visual_id,
        name = %character.name,
        map_id = instance.map().id,
        "character entered the world"
    );
}

/// The base instance of `map_id`, or the first map's when it doesn't exist,
/// and the walkable cell nearest to the stored position.
fn arrival(
    ctx: &GameContext,
    map_id: i16,
    x: i16,
    y: i16,
) -> Option<(Arc<MapInstance>, i16, i16)> {
    let (instance, x, y) = match ctx.world.base_instance(map_id) {
        Ok(instance) => (instance, x, y),
        Err(_) => {
            let fallback = ctx.world.data().maps.iter().map(|m| m.id).min()?;
            tracing::warn!(map_id, fallback, "stored map is unknown, using fallback");
            let instance = ctx.world.base_instance(fallback).ok()?;
            let (width, height) = (instance.map().width(), instance.map().height());
            (instance, width / 2, height / 2)
        }
    };
    let (cell_x, cell_y) = instance.map().nearest_walkable(x, y).unwrap_or((x, y));
    if (cell_x, cell_y) != (x, y) {
        tracing::debug!(map_id = instance.map().id, x, y, cell_x, cell_y, "stored cell not walkable, moved");
    }
    Some((instance, cell_x, cell_y))
}

pub(super) fn player_in(character: &Character) -> InPacket {
    let position = character.position();
    InPacket {
        visual_type: VisualType::Player,
        vnum: i16::from(character.class),
        visual_id: character.visual_id,
        x: position.x,
        y: position.y,
        direction: position.direction,
        name: Some(character.name.clone()),
    }
}

fn player_out(character: &Character) -> OutPacket {
    OutPacket {
        visual_type: VisualType::Player,
        visual_id: character.visual_id,
    }
}

/// Places the character in `instance` and sends everything the client
/// needs to draw it, then announces the arrival to the others.
pub(super) fn enter_map(
    ctx: &GameContext,
    session: &Arc<Session>,
    character: &Character,
    instance: &MapInstance,
    x: i16,
    y: i16,
) {
    let map = instance.map();
    character.enter_map(map.id, instance.id(), x, y);
    let direction = character.position().direction;

    session.send(&ChangeMapPacket {
        map_type: 0,
        map_id: map.id,
        is_instance: instance.instance_type() != InstanceType::Base,
    });
    session.send(&AtPacket {
        character_id: character.visual_id,
        map_id: map.id,
        x,
        y,
        direction,
        unknown1: 0,
        music: map.music,
        unknown2: -1,
    });
    instance.send_entities(session);
    for id in instance.group().snapshot() {
        let Some(other) = ctx.broadcaster.get(id) else {
            continue;
        };
        if let Some(other_character) = other.character() {
            session.send(&player_in(other_character));
            if let Some(shop) = shop::shop_packet(&other, other_character) {
                session.send(&shop);
            }
        }
    }

    instance.register_session(session.id());
    instance.broadcast(&ctx.broadcaster, &player_in(character), Some(session.id()));
}

/// Takes the character out of its instance and tells the others.
pub(super) fn leave_map(ctx: &GameContext, session: &Session, character: &Character) {
    let Some(instance) = character
        .leave_map()
        .and_then(|id| ctx.world.instance(id))
    else {
        return;
    };
    instance.unregister_session(session.id());
    instance.broadcast(&ctx.broadcaster, &player_out(character), None);
}

/// Takes a session's character out of the world. Safe to call more than
/// once; only the first call does anything.
///
/// Cancels its exchange, closes its shop, leaves its map, tells its
/// friends and saves it. A failed save is logged.
pub fn logout(ctx: &GameContext, session: &Arc<Session>) {
    let Some(character) = session.character() else {
        return;
    };
    let _turn = session.turn();
    if ctx.broadcaster.unregister(session.id()).is_none() {
        return;
    }

    exchange::cancel(ctx, session, character);
    shop::close(ctx, session, character);
    leave_map(ctx, session, character);
    relation::announce_status(ctx, character, false);

    if let Err(e) = ctx.store.save(&character.to_record()) {
        tracing::warn!(
            session_id = %session.id(),
            visual_id = %character.visual_id,
            error = %e,
            "character save failed"
        );
    }
    tracing::info!(session_id = %session.id(), visual_id = %character.visual_id, "character left the world");
}
