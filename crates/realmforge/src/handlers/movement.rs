//! Walking and portals.

use std::sync::Arc;

use realmforge_protocol::VisualType;
use realmforge_protocol::client::{PortalRequestPacket, WalkPacket};
use realmforge_protocol::server::MovePacket;
use realmforge_session::Session;

use super::login::{enter_map, leave_map};
use crate::GameContext;
use crate::language::LanguageKey;

/// `walk <x> <y> [speed]`
pub(super) fn walk(ctx: &GameContext, session: &Arc<Session>, packet: WalkPacket) {
    let Some(character) = session.character() else {
        return;
    };
    let Some(instance) = ctx.instance_of(character) else {
        return;
    };
    if !instance.map().is_walkable(packet.x, packet.y) {
        tracing::debug!(visual_id = %character.visual_id, x = packet.x, y = packet.y, "walk onto a blocked cell");
        return;
    }
    character.move_to(packet.x, packet.y);
    instance.broadcast(
        &ctx.broadcaster,
        &MovePacket {
            visual_type: VisualType::Player,
            visual_id: character.visual_id,
            x: packet.x,
            y: packet.y,
            // The server's speed wins over the client's.
            speed: ctx.world.data().class_speed(character.class),
        },
        Some(session.id()),
    );
}

/// `preq`: takes the portal the character stands on.
pub(super) fn portal(ctx: &GameContext, session: &Arc<Session>, _packet: PortalRequestPacket) {
    let Some(character) = session.character() else {
        return;
    };
    let Some(instance) = ctx.instance_of(character) else {
        return;
    };
    let position = character.position();
    let Some((map_id, x, y)) = instance
        .portal_near(position.x, position.y)
        .map(|p| (p.destination_map, p.destination_x, p.destination_y))
    else {
        ctx.notify(session, LanguageKey::NoPortal, &[]);
        return;
    };
    let destination = match ctx.world.base_instance(map_id) {
        Ok(destination) => destination,
        Err(e) => {
            tracing::warn!(visual_id = %character.visual_id, map_id, error = %e, "portal leads nowhere");
            return;
        }
    };

    leave_map(ctx, session, character);
    enter_map(ctx, session, character, &destination, x, y);
    tracing::debug!(visual_id = %character.visual_id, from = instance.map().id, to = map_id, "portal taken");
}
