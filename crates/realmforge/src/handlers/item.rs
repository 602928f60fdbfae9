//! Dropping items on the ground and picking them up.

use std::sync::Arc;

use realmforge_protocol::VisualType;
use realmforge_protocol::client::{GetPacket, PutPacket};
use realmforge_protocol::server::PickupPacket;
use realmforge_session::Session;
use realmforge_world::{DropRejection, PickupRejection};

use super::ivn;
use crate::GameContext;
use crate::language::LanguageKey;

/// `put <pocket> <slot> <amount>`
pub(super) fn put(ctx: &GameContext, session: &Arc<Session>, packet: PutPacket) {
    let Some(character) = session.character() else {
        return;
    };
    let Some(instance) = ctx.instance_of(character) else {
        return;
    };
    match instance.put_item(packet.amount, packet.pocket, packet.slot, character) {
        Ok(item) => {
            instance.broadcast(&ctx.broadcaster, &item.drop_packet(), None);
            session.send(&ivn(&character.inventory(), packet.pocket));
        }
        Err(rejection) => {
            tracing::debug!(visual_id = %character.visual_id, %rejection, "drop refused");
            let key = match rejection {
                DropRejection::ItemNotFound => LanguageKey::ItemNotFound,
                DropRejection::InvalidAmount => LanguageKey::InvalidAmount,
                DropRejection::NoFreeCell => LanguageKey::NoFreeCell,
            };
            ctx.notify(session, key, &[]);
        }
    }
}

/// `get <type> <character_id> <item_id>`
pub(super) fn get(ctx: &GameContext, session: &Arc<Session>, packet: GetPacket) {
    let Some(character) = session.character() else {
        return;
    };
    if packet.pickup_type != VisualType::Player || packet.character_id != character.visual_id {
        tracing::debug!(visual_id = %character.visual_id, picker = %packet.character_id, "pickup for someone else ignored");
        return;
    }
    let Some(instance) = ctx.instance_of(character) else {
        return;
    };
    match instance.take_item(packet.item_id, character) {
        Ok(item) => {
            instance.broadcast(
                &ctx.broadcaster,
                &PickupPacket {
                    visual_type: VisualType::Player,
                    visual_id: character.visual_id,
                    item_id: item.visual_id,
                    unknown: 0,
                },
                None,
            );
            session.send(&ivn(&character.inventory(), item.item.pocket));
            tracing::debug!(visual_id = %character.visual_id, item_id = %item.visual_id, "item picked up");
        }
        Err(rejection) => {
            let key = match rejection {
                PickupRejection::NotFound => LanguageKey::ItemNotFound,
                PickupRejection::TooFar => LanguageKey::ItemTooFar,
                PickupRejection::InventoryFull => LanguageKey::InventoryFull,
            };
            ctx.notify(session, key, &[]);
        }
    }
}
