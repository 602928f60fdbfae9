//! Unified error type for the Realmforge server.

use realmforge_protocol::{ProtocolError, RegistryError};
use realmforge_session::SessionError;
use realmforge_transport::TransportError;
use realmforge_world::WorldError;

use crate::store::PersistenceError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `realmforge` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
///
/// Only startup paths return it to the caller. Once a connection is
/// running, errors end that connection and are logged.
#[derive(Debug, thiserror::Error)]
pub enum RealmError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A line could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A keyword or handler was registered twice at startup.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A session-level error (auth, identity attach).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Game data or instance management failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// The character store failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The peer did not complete the `auth` handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmforge_protocol::VisualId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let realm_err: RealmError = err.into();
        assert!(matches!(realm_err, RealmError::Transport(_)));
        assert!(realm_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownKeyword("nope".into());
        let realm_err: RealmError = err.into();
        assert!(matches!(realm_err, RealmError::Protocol(_)));
    }

    #[test]
    fn test_from_registry_error() {
        let err = RegistryError::DuplicateHandler("WalkPacket");
        let realm_err: RealmError = err.into();
        assert!(matches!(realm_err, RealmError::Registry(_)));
        assert!(realm_err.to_string().contains("WalkPacket"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let realm_err: RealmError = err.into();
        assert!(matches!(realm_err, RealmError::Session(_)));
    }

    #[test]
    fn test_from_world_error() {
        let err = WorldError::MapNotFound(7);
        let realm_err: RealmError = err.into();
        assert!(matches!(realm_err, RealmError::World(_)));
    }

    #[test]
    fn test_from_persistence_error() {
        let err = PersistenceError::NotFound(VisualId(3));
        let realm_err: RealmError = err.into();
        assert!(matches!(realm_err, RealmError::Persistence(_)));
    }
}
