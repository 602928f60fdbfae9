//! Map instances and their simulation for Realmforge.
//!
//! Every map instance owns its entities and the broadcast group of the
//! sessions standing in it, and runs a life task that advances monsters
//! and NPCs while anybody is around.
//!
//! # Key types
//!
//! - [`World`] — creates, tracks and removes map instances
//! - [`MapInstance`] — entities, drops and pickups, session presence
//! - [`IdleState`] — when an empty instance goes to sleep
//! - [`GameData`] — static maps, spawns, portals and stat tables
//! - [`WorldConfig`] — tick interval, sleep grace, pool size, item lifetime

mod config;
pub mod data;
mod entity;
mod error;
mod idle;
mod instance;
mod life;
mod map;
mod world;

pub use config::WorldConfig;
pub use data::GameData;
pub use entity::{MapItem, MapMonster, MapNpc, Portal};
pub use error::WorldError;
pub use idle::IdleState;
pub use instance::{
    DropRejection, InstanceType, MapInstance, PICKUP_RANGE, PORTAL_RANGE, PickupRejection,
    TickReport,
};
pub use life::spawn_life;
pub use map::Map;
pub use world::World;
