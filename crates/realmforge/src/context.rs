//! The services every handler works with.

use std::sync::Arc;

use realmforge_protocol::server::{InfoPacket, MsgPacket};
use realmforge_protocol::{MessageType, VisualId};
use realmforge_session::{Broadcaster, Character, Session};
use realmforge_world::{MapInstance, World};

use crate::directory::ChannelDirectory;
use crate::language::{Language, LanguageKey};
use crate::store::CharacterStore;

/// Shared, explicitly constructed services.
///
/// One `GameContext` exists per server and is handed to every handler by
/// reference. Sessions and map instances are reached through the
/// [`Broadcaster`] and the [`World`] by id; handlers never keep owning
/// references between calls.
pub struct GameContext {
    pub broadcaster: Arc<Broadcaster>,
    pub world: Arc<World>,
    pub store: Arc<dyn CharacterStore>,
    pub directory: Arc<dyn ChannelDirectory>,
    pub language: Arc<Language>,
    /// This process's id in the channel directory.
    pub channel_id: u32,
}

impl GameContext {
    /// The instance `character` currently stands in.
    pub fn instance_of(&self, character: &Character) -> Option<Arc<MapInstance>> {
        character
            .position()
            .instance
            .and_then(|id| self.world.instance(id))
    }

    /// The online session playing `visual_id`.
    pub fn session_of(&self, visual_id: VisualId) -> Option<Arc<Session>> {
        self.broadcaster.find_character(visual_id)
    }

    /// Resolves a text in the session's region.
    pub fn text(&self, session: &Session, key: LanguageKey, args: &[&str]) -> String {
        self.language.format(key, session.region(), args)
    }

    /// Sends a red `msg` notice.
    pub fn notify(&self, session: &Session, key: LanguageKey, args: &[&str]) {
        session.send(&MsgPacket {
            message_type: MessageType::Red,
            message: self.text(session, key, args),
        });
    }

    /// Sends an `info` box.
    pub fn inform(&self, session: &Session, key: LanguageKey, args: &[&str]) {
        session.send(&InfoPacket {
            message: self.text(session, key, args),
        });
    }
}

impl std::fmt::Debug for GameContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameContext")
            .field("world", &self.world)
            .field("online", &self.broadcaster.len())
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}
