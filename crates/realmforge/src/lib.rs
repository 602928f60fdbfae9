//! # Realmforge
//!
//! Server core for a multiplayer world spoken over a line-oriented text
//! protocol.
//!
//! Realmforge accepts connections over raw TCP or WebSocket, authenticates
//! them with an `auth` handshake, and dispatches every further line to a
//! typed handler: character selection, walking and portals, trading,
//! personal shops, dropping and picking up items, friends and blacklist.
//! Map instances simulate their monsters and NPCs on a tick while players
//! are around.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use realmforge::prelude::*;
//!
//! // Implement Authenticator for your account system, then:
//! // let server = RealmServerBuilder::new(GameData::load("game_data.json")?)
//! //     .bind("0.0.0.0:4000")
//! //     .store(Arc::new(my_store))
//! //     .build_line(my_auth)
//! //     .await?;
//! // server.run().await
//! ```

mod config;
mod connection;
mod context;
pub mod directory;
mod dispatch;
mod error;
pub mod handlers;
pub mod language;
mod server;
pub mod store;

pub use config::{ServerConfig, TransportKind};
pub use context::GameContext;
pub use dispatch::{DispatchOutcome, Dispatcher, DispatcherBuilder, SessionQueue};
pub use error::RealmError;
pub use server::{RealmServer, RealmServerBuilder};

pub use realmforge_protocol as protocol;
pub use realmforge_session as session;
pub use realmforge_tick as tick;
pub use realmforge_transport as transport;
pub use realmforge_world as world;

pub mod prelude {
    pub use crate::directory::{ChannelDirectory, LocalOnlyDirectory};
    pub use crate::language::{Language, LanguageKey};
    pub use crate::store::{CharacterStore, InMemoryCharacterStore, PersistenceError};
    pub use crate::{
        GameContext, RealmError, RealmServer, RealmServerBuilder, ServerConfig, TransportKind,
    };
    pub use realmforge_protocol::{AccountId, VisualId};
    pub use realmforge_session::{
        Account, Authenticator, CharacterRecord, RegionType, SessionConfig, SessionError,
    };
    pub use realmforge_world::{GameData, WorldConfig};
}
