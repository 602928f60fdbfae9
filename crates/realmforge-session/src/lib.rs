//! Sessions, characters and the online directory for Realmforge.
//!
//! This crate knows who is connected and what they are doing:
//!
//! 1. **Authentication** — turning an `auth` token into an [`Account`]
//!    ([`Authenticator`] trait)
//! 2. **Sessions** — one [`Session`] per connection, with an ordered
//!    outbound queue and a typed state bag
//! 3. **Characters** — identity, position, inventory, relations and the
//!    exchange/shop [`Interaction`] guard
//! 4. **Directory** — the [`Broadcaster`] and per-instance
//!    [`BroadcastGroup`]s used for lookups and fan-out
//!
//! # How it fits in the stack
//!
//! ```text
//! World Layer (above)  ← map instances own a BroadcastGroup each
//!     ↕
//! Session Layer (this crate)  ← identity, per-session state, fan-out
//!     ↕
//! Protocol Layer (below)  ← provides ids, wire enums and packet encoding
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod broadcaster;
mod character;
mod error;
mod inventory;
mod record;
mod session;

pub use auth::{Account, Authenticator, RegionType};
pub use broadcaster::{BroadcastGroup, Broadcaster};
pub use character::{
    Character, ExchangeData, ExchangeInfo, ExchangeItem, Interaction, MapInstanceId, Position,
    lock_pair,
};
pub use error::{InteractionConflict, InventoryError, SessionError};
pub use inventory::{Inventory, ItemInstance, MAX_GOLD, MAX_STACK, POCKET_SIZE};
pub use record::{CharacterRecord, CharacterRelation};
pub use session::{Session, SessionConfig, SessionId};
