//! The process-wide directory of in-game sessions.
//!
//! The [`Broadcaster`] is the single authority on who is online. A session
//! is registered once its character is attached and unregistered when it
//! goes away. Lookups go through predicates over the live characters, and
//! fan-out sends go either to a whole [`BroadcastGroup`] or to everyone.
//!
//! # Concurrency note
//!
//! Both the directory and the groups are `DashMap`/`DashSet`s, so inserts
//! and removals only lock one shard. Lookups and broadcasts first copy the
//! matching `Arc<Session>`s out and release the shard locks before running
//! predicates or encoding, so a slow broadcast never blocks a login.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use realmforge_protocol::{Packet, VisualId, encode};

use crate::{Character, Session, SessionId};

/// Everyone currently in game.
#[derive(Debug, Default)]
pub struct Broadcaster {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session. Returns the session previously registered under the
    /// same id, if any.
    pub fn register(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        let id = session.id();
        let previous = self.sessions.insert(id, session);
        tracing::debug!(session_id = %id, online = self.sessions.len(), "session registered");
        previous
    }

    /// Removes a session. Idempotent: unregistering an unknown id is a
    /// no-op that returns `None`.
    pub fn unregister(&self, id: SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(&id).map(|(_, session)| session);
        if removed.is_some() {
            tracing::debug!(session_id = %id, online = self.sessions.len(), "session unregistered");
        }
        removed
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// The first session whose character satisfies `predicate`.
    pub fn find_one(&self, predicate: impl Fn(&Character) -> bool) -> Option<Arc<Session>> {
        self.snapshot()
            .into_iter()
            .find(|session| session.character().is_some_and(|c| predicate(c)))
    }

    /// Every session whose character satisfies `predicate`.
    pub fn find_all(&self, predicate: impl Fn(&Character) -> bool) -> Vec<Arc<Session>> {
        self.snapshot()
            .into_iter()
            .filter(|session| session.character().is_some_and(|c| predicate(c)))
            .collect()
    }

    /// The session playing `visual_id`.
    pub fn find_character(&self, visual_id: VisualId) -> Option<Arc<Session>> {
        self.find_one(|c| c.visual_id == visual_id)
    }

    /// Sends `packet` to every member of `group` except `except`.
    ///
    /// The packet is encoded once. Members that are no longer registered
    /// are skipped.
    pub fn broadcast<P: Packet>(&self, group: &BroadcastGroup, packet: &P, except: Option<SessionId>) {
        let Some(line) = encode_for_broadcast(packet) else {
            return;
        };
        for id in group.snapshot() {
            if Some(id) == except {
                continue;
            }
            if let Some(session) = self.get(id) {
                session.send_line(line.clone());
            }
        }
    }

    /// Sends `packet` to every registered session.
    pub fn broadcast_all<P: Packet>(&self, packet: &P) {
        let Some(line) = encode_for_broadcast(packet) else {
            return;
        };
        for session in self.snapshot() {
            session.send_line(line.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

fn encode_for_broadcast<P: Packet>(packet: &P) -> Option<String> {
    match encode(packet) {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::error!(
                keyword = P::descriptor().keyword(),
                error = %e,
                "refusing to broadcast unencodable packet"
            );
            None
        }
    }
}

/// The sessions subscribed to one map instance. Holds ids only; the
/// sessions themselves are resolved through the [`Broadcaster`].
#[derive(Debug, Default)]
pub struct BroadcastGroup {
    members: DashSet<SessionId>,
}

impl BroadcastGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the session was already a member.
    pub fn join(&self, id: SessionId) -> bool {
        self.members.insert(id)
    }

    /// Returns `false` if the session was not a member.
    pub fn leave(&self, id: SessionId) -> bool {
        self.members.remove(&id).is_some()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// A copy of the current members.
    pub fn snapshot(&self) -> Vec<SessionId> {
        self.members.iter().map(|id| *id).collect()
    }
}
