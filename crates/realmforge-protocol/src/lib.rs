//! Wire protocol for Realmforge.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Descriptors** ([`MessageDescriptor`], [`FieldKind`]) — the field
//!   layout of every message, declared once as data.
//! - **Codec** ([`encode_values`], [`decode_values`], [`Packet`]) — one
//!   generic routine that turns lines into values and values into lines,
//!   driven entirely by descriptors.
//! - **Registry** ([`PacketRegistry`]) — keyword lookup for inbound lines.
//! - **Packets** ([`client`], [`server`]) — the typed messages themselves.
//! - **Errors** ([`ProtocolError`], [`RegistryError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw lines) and session
//! (player identity). It doesn't know about connections or maps — it only
//! knows how lines are laid out.
//!
//! ```text
//! Transport (line) → Protocol (Packet) → Dispatcher (handler)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod descriptor;
mod error;
mod registry;
mod types;
mod value;

pub mod client;
pub mod server;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{
    FieldReader, FieldWriter, Packet, SEPARATOR, decode, decode_values, encode, encode_values,
    from_values, to_values,
};
pub use descriptor::{FieldDescriptor, FieldKind, MessageDescriptor, Requirement};
pub use error::{ProtocolError, RegistryError};
pub use registry::{AnyPacket, PacketRegistry, RegisteredPacket, keyword_of};
pub use types::{
    AccountId, ExchangeResultType, MessageType, PocketType, RelationType, RequestExchangeType,
    SayColorType, ShopRequestType, VisualId, VisualType,
};
pub use value::FieldValue;
