//! Personal shops.
//!
//! An open shop is an interaction mode like trading: a character can't do
//! both at once. Its name lives in the session's state bag.

use std::sync::Arc;

use realmforge_protocol::client::ManageShopPacket;
use realmforge_protocol::server::ShopPacket;
use realmforge_protocol::{ShopRequestType, VisualType};
use realmforge_session::{Character, InteractionConflict, Session};

use crate::GameContext;
use crate::language::LanguageKey;

const MAX_NAME_CHARS: usize = 20;

/// The open shop of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonalShop {
    pub name: String,
}

/// `m_shop <type> [name]`
pub(super) fn manage(ctx: &GameContext, session: &Arc<Session>, packet: ManageShopPacket) {
    let Some(character) = session.character() else {
        return;
    };
    match packet.request_type {
        ShopRequestType::Open => open(ctx, session, character, packet.name),
        ShopRequestType::Close => {
            if !close(ctx, session, character) {
                tracing::debug!(visual_id = %character.visual_id, "no shop to close");
            }
        }
    }
}

fn open(ctx: &GameContext, session: &Session, character: &Character, name: Option<String>) {
    let Some(instance) = ctx.instance_of(character) else {
        return;
    };
    if !instance.map().shop_allowed {
        ctx.notify(session, LanguageKey::ShopNotAllowed, &[]);
        return;
    }
    if let Err(conflict) = character.interaction().open_shop() {
        let key = match conflict {
            InteractionConflict::InShop => LanguageKey::ShopAlreadyOpen,
            InteractionConflict::InExchange => LanguageKey::Busy,
        };
        ctx.notify(session, key, &[]);
        return;
    }

    let name: String = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| character.name.clone())
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();
    session.with_state(|shop: &mut PersonalShop| shop.name = name.clone());
    instance.broadcast(
        &ctx.broadcaster,
        &ShopPacket {
            visual_type: VisualType::Player,
            visual_id: character.visual_id,
            is_open: true,
            name: Some(name),
        },
        None,
    );
    tracing::debug!(visual_id = %character.visual_id, "shop opened");
}

/// Closes the character's shop and tells the instance. Returns whether a
/// shop was open.
pub(super) fn close(ctx: &GameContext, session: &Session, character: &Character) -> bool {
    if !character.interaction().close_shop() {
        return false;
    }
    session.take_state::<PersonalShop>();
    let packet = ShopPacket {
        visual_type: VisualType::Player,
        visual_id: character.visual_id,
        is_open: false,
        name: None,
    };
    match ctx.instance_of(character) {
        Some(instance) => instance.broadcast(&ctx.broadcaster, &packet, None),
        None => session.send(&packet),
    }
    tracing::debug!(visual_id = %character.visual_id, "shop closed");
    true
}

/// The `shop` line a newcomer needs to see `character`'s open shop.
pub(super) fn shop_packet(session: &Session, character: &Character) -> Option<ShopPacket> {
    if !character.interaction().in_shop() || !session.has_state::<PersonalShop>() {
        return None;
    }
    let name = session.with_state(|shop: &mut PersonalShop| shop.name.clone());
    Some(ShopPacket {
        visual_type: VisualType::Player,
        visual_id: character.visual_id,
        is_open: true,
        name: Some(name),
    })
}
