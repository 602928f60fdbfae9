//! Error types for the session layer.

use realmforge_protocol::VisualId;

use crate::SessionId;

/// Errors that can occur while authenticating or attaching identity to a
/// session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The handshake ran twice on one connection.
    #[error("session {0} is already authenticated")]
    AlreadyAuthenticated(SessionId),

    /// A character was attached to a session that already has one.
    #[error("session {0} already plays a character")]
    CharacterAlreadyAttached(SessionId),

    /// The character belongs to a different account.
    #[error("character {0} does not belong to this account")]
    ForeignCharacter(VisualId),

    /// The session was closed; nothing more can be sent on it.
    #[error("session {0} is closed")]
    Closed(SessionId),
}

/// Why an inventory operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("no item in that slot")]
    EmptySlot,

    #[error("amount is out of range")]
    InvalidAmount,

    #[error("no free slot in the pocket")]
    Full,

    #[error("not enough gold")]
    InsufficientGold,
}

/// A request that would put a character in two interactive modes at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InteractionConflict {
    #[error("character is trading")]
    InExchange,

    #[error("character has a shop open")]
    InShop,
}
