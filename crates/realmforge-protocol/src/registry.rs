//! Keyword → packet type lookup.
//!
//! The protocol is asymmetric: `exc_list` means one thing from the client
//! and another from the server. Each direction therefore gets its own
//! registry, built once at startup by [`PacketRegistry::client`] or
//! [`PacketRegistry::server`].

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::client::*;
use crate::server::*;
use crate::{MessageDescriptor, Packet, ProtocolError, RegistryError, SEPARATOR, decode};

/// A decoded packet whose concrete type is known from [`RegisteredPacket::type_id`].
pub type AnyPacket = Box<dyn Any + Send>;

type DecodeFn = fn(&str) -> Result<AnyPacket, ProtocolError>;

/// Everything the dispatcher needs to know about one packet type.
#[derive(Debug, Clone, Copy)]
pub struct RegisteredPacket {
    pub descriptor: &'static MessageDescriptor,
    pub type_id: TypeId,
    pub type_name: &'static str,
    decode: DecodeFn,
}

impl RegisteredPacket {
    fn of<P: Packet>() -> Self {
        Self {
            descriptor: P::descriptor(),
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            decode: decode_any::<P>,
        }
    }

    /// Decodes `line` into this packet type.
    pub fn decode(&self, line: &str) -> Result<AnyPacket, ProtocolError> {
        (self.decode)(line)
    }
}

fn decode_any<P: Packet>(line: &str) -> Result<AnyPacket, ProtocolError> {
    Ok(Box::new(decode::<P>(line)?))
}

/// Returns the routing keyword of a raw line.
pub fn keyword_of(line: &str) -> &str {
    line.split(SEPARATOR).next().unwrap_or_default()
}

/// Packet types indexed by keyword.
#[derive(Debug, Default)]
pub struct PacketRegistry {
    packets: HashMap<&'static str, RegisteredPacket>,
}

impl PacketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every packet the client may send.
    pub fn client() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register::<AuthPacket>()?;
        registry.register::<SelectPacket>()?;
        registry.register::<WalkPacket>()?;
        registry.register::<RequestExchangePacket>()?;
        registry.register::<ExchangeOfferPacket>()?;
        registry.register::<ManageShopPacket>()?;
        registry.register::<PutPacket>()?;
        registry.register::<GetPacket>()?;
        registry.register::<PortalRequestPacket>()?;
        registry.register::<BlacklistAddPacket>()?;
        registry.register::<BlacklistDeletePacket>()?;
        registry.register::<FriendDeletePacket>()?;
        Ok(registry)
    }

    /// Every packet the server may send.
    pub fn server() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register::<ModalPacket>()?;
        registry.register::<DlgPacket>()?;
        registry.register::<MsgPacket>()?;
        registry.register::<InfoPacket>()?;
        registry.register::<SayPacket>()?;
        registry.register::<ExchangeListPacket>()?;
        registry.register::<ExchangeClosePacket>()?;
        registry.register::<GoldPacket>()?;
        registry.register::<DropPacket>()?;
        registry.register::<PickupPacket>()?;
        registry.register::<OutPacket>()?;
        registry.register::<InPacket>()?;
        registry.register::<PortalPacket>()?;
        registry.register::<ChangeMapPacket>()?;
        registry.register::<AtPacket>()?;
        registry.register::<MovePacket>()?;
        registry.register::<FinfoPacket>()?;
        registry.register::<FinitPacket>()?;
        registry.register::<BlinitPacket>()?;
        registry.register::<ShopPacket>()?;
        registry.register::<IvnPacket>()?;
        Ok(registry)
    }

    /// Adds `P`, validating its descriptor.
    ///
    /// # Errors
    /// Fails if the keyword is taken or the layout is invalid.
    pub fn register<P: Packet>(&mut self) -> Result<(), RegistryError> {
        let entry = RegisteredPacket::of::<P>();
        let keyword = entry.descriptor.keyword();
        entry
            .descriptor
            .validate()
            .map_err(|reason| RegistryError::InvalidDescriptor { keyword, reason })?;
        if self.packets.contains_key(keyword) {
            return Err(RegistryError::DuplicateKeyword(keyword));
        }
        self.packets.insert(keyword, entry);
        tracing::trace!(keyword, packet = entry.type_name, "packet registered");
        Ok(())
    }

    pub fn get(&self, keyword: &str) -> Option<&RegisteredPacket> {
        self.packets.get(keyword)
    }

    /// Finds the registration for a packet type.
    pub fn find_type(&self, type_id: TypeId) -> Option<&RegisteredPacket> {
        self.packets.values().find(|p| p.type_id == type_id)
    }

    /// Resolves the line's keyword and decodes it.
    pub fn decode(&self, line: &str) -> Result<(&RegisteredPacket, AnyPacket), ProtocolError> {
        let keyword = keyword_of(line);
        if keyword.is_empty() {
            return Err(ProtocolError::EmptyLine);
        }
        let entry = self
            .get(keyword)
            .ok_or_else(|| ProtocolError::UnknownKeyword(keyword.to_owned()))?;
        Ok((entry, entry.decode(line)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredPacket> {
        self.packets.values()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
