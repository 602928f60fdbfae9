//! Error types for the protocol layer.
//!
//! Decoding problems ([`ProtocolError`]) are per-line and recoverable: the
//! caller logs them and keeps the connection. Registration problems
//! ([`RegistryError`]) only happen while the server starts and are fatal.

/// Errors produced while encoding or decoding a single line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line had no keyword at all.
    #[error("empty line")]
    EmptyLine,

    /// No descriptor is registered for the line's leading keyword.
    #[error("unknown keyword `{0}`")]
    UnknownKeyword(String),

    /// The line was handed to a descriptor with a different keyword.
    #[error("expected keyword `{expected}`, found `{found}`")]
    KeywordMismatch {
        expected: &'static str,
        found: String,
    },

    /// A required field had no token.
    #[error("missing field {index} (`{name}`)")]
    MissingField { index: usize, name: &'static str },

    /// A token was present but could not be accepted for its field.
    ///
    /// `index` is the position of the top-level field the token belongs
    /// to, so errors inside sub-lists point at the list itself.
    #[error("field {index} rejected token `{token}`: {reason}")]
    FieldValidation {
        index: usize,
        token: String,
        reason: String,
    },

    /// A value handed to the encoder, or read back by a packet type, does
    /// not fit the descriptor.
    #[error("invalid value for field {index} (`{name}`): {reason}")]
    InvalidValue {
        index: usize,
        name: &'static str,
        reason: String,
    },
}

/// Errors raised while building registries at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two packet types claim the same keyword.
    #[error("keyword `{0}` is registered twice")]
    DuplicateKeyword(&'static str),

    /// Two handlers are bound to the same packet type.
    #[error("packet type `{0}` already has a handler")]
    DuplicateHandler(&'static str),

    /// A handler is bound to a packet type the registry doesn't know.
    #[error("packet type `{0}` is not registered")]
    UnregisteredPacket(&'static str),

    /// A descriptor breaks a layout rule.
    #[error("descriptor `{keyword}` is invalid: {reason}")]
    InvalidDescriptor {
        keyword: &'static str,
        reason: String,
    },
}
