//! Packet handlers, one module per feature.
//!
//! Every handler has the same shape, `fn(&GameContext, &Arc<Session>, P)`,
//! and is bound to its packet type in [`game_dispatcher`]. Handlers never
//! fail: rejected requests become notices to the client, unexpected input
//! becomes a log line.

mod exchange;
mod item;
mod login;
mod movement;
mod relation;
mod shop;

use realmforge_protocol::server::{IvnItem, IvnPacket};
use realmforge_protocol::{PacketRegistry, PocketType, RegistryError};
use realmforge_session::Inventory;

use crate::Dispatcher;

pub use exchange::cancel as cancel_exchange;
pub use login::logout;
pub use relation::apply_relation_event;
pub use shop::PersonalShop;

/// The dispatcher for client packets with every game handler bound.
pub fn game_dispatcher() -> Result<Dispatcher, RegistryError> {
    Ok(Dispatcher::builder(PacketRegistry::client()?)
        .bind(login::repeated_auth)?
        .bind(login::select)?
        .bind(movement::walk)?
        .bind(movement::portal)?
        .bind(exchange::request)?
        .bind(exchange::offer)?
        .bind(shop::manage)?
        .bind(item::put)?
        .bind(item::get)?
        .bind(relation::blacklist_add)?
        .bind(relation::blacklist_delete)?
        .bind(relation::friend_delete)?
        .build())
}

/// The `ivn` refresh of one pocket.
pub(crate) fn ivn(inventory: &Inventory, pocket: PocketType) -> IvnPacket {
    IvnPacket {
        pocket,
        items: inventory
            .pocket(pocket)
            .into_iter()
            .map(|item| IvnItem {
                slot: item.slot,
                vnum: item.vnum,
                amount: item.amount,
            })
            .collect(),
    }
}
