//! Packets sent by the game client.

use std::sync::LazyLock;

use crate::{
    FieldKind, FieldReader, FieldWriter, MessageDescriptor, Packet, PocketType, ProtocolError,
    RequestExchangeType, Requirement, ShopRequestType, VisualId, VisualType,
};

/// `auth <version> <token>`: the connection handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPacket {
    pub version: u32,
    pub token: String,
}

impl Packet for AuthPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("auth")
                .field("version", FieldKind::U32)
                .field("token", FieldKind::Str)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.version).string(&self.token);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: r.int()?,
            token: r.string()?,
        })
    }
}

/// `select <character_id>`: enter the world with one of the account's characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectPacket {
    pub character_id: VisualId,
}

impl Packet for SelectPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("select")
                .field("character_id", FieldKind::NON_NEGATIVE)
                .requires(Requirement::Authenticated)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.character_id);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            character_id: r.int()?,
        })
    }
}

/// `walk <x> <y> [speed]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkPacket {
    pub x: i16,
    pub y: i16,
    pub speed: Option<u8>,
}

impl Packet for WalkPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("walk")
                .field("x", FieldKind::I16)
                .field("y", FieldKind::I16)
                .optional("speed", FieldKind::U8)
                .requires(Requirement::InGame)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.x).int(self.y).opt_int(self.speed);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: r.int()?,
            y: r.int()?,
            speed: r.opt_int()?,
        })
    }
}

/// `req_exc <type> [visual_id]`: one step of the trade protocol.
///
/// Also nested inside `dlg` as the yes/no answers offered to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestExchangePacket {
    pub request_type: RequestExchangeType,
    pub visual_id: Option<VisualId>,
}

impl Packet for RequestExchangePacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("req_exc")
                .field("request_type", FieldKind::int(1, 5))
                .optional("visual_id", FieldKind::NON_NEGATIVE)
                .requires(Requirement::InGame)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.request_type).opt_int(self.visual_id);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            request_type: r.int()?,
            visual_id: r.opt_int()?,
        })
    }
}

/// One offered stack in `exc_list`: `pocket.slot.amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOfferItem {
    pub pocket: PocketType,
    pub slot: i16,
    pub amount: i16,
}

impl Packet for ExchangeOfferItem {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::sub()
                .field("pocket", FieldKind::U8)
                .field("slot", FieldKind::int(0, i16::MAX as i64))
                .field("amount", FieldKind::int(1, 999))
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.pocket).int(self.slot).int(self.amount);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            pocket: r.int()?,
            slot: r.int()?,
            amount: r.int()?,
        })
    }
}

/// `exc_list <gold> <bank_gold> [pocket.slot.amount ...]`: the sender's offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOfferPacket {
    pub gold: i64,
    pub bank_gold: i64,
    pub items: Vec<ExchangeOfferItem>,
}

impl Packet for ExchangeOfferPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("exc_list")
                .field("gold", FieldKind::NON_NEGATIVE)
                .field("bank_gold", FieldKind::NON_NEGATIVE)
                .field("items", FieldKind::list::<ExchangeOfferItem>('.'))
                .requires(Requirement::InGame)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.gold).int(self.bank_gold).list(&self.items);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            gold: r.int()?,
            bank_gold: r.int()?,
            items: r.list()?,
        })
    }
}

/// `m_shop <type> [name]`: open or close a personal shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManageShopPacket {
    pub request_type: ShopRequestType,
    pub name: Option<String>,
}

impl Packet for ManageShopPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("m_shop")
                .field("request_type", FieldKind::int(0, 1))
                .optional("name", FieldKind::Text)
                .requires(Requirement::InGame)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.request_type).opt_text(self.name.as_deref());
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            request_type: r.int()?,
            name: r.opt_text()?,
        })
    }
}

/// `put <pocket> <slot> <amount>`: drop part of a stack on the ground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutPacket {
    pub pocket: PocketType,
    pub slot: i16,
    /// Range-checked by the map instance, not here, so that the rejection
    /// reaches the player as a notice.
    pub amount: i16,
}

impl Packet for PutPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("put")
                .field("pocket", FieldKind::U8)
                .field("slot", FieldKind::int(0, i16::MAX as i64))
                .field("amount", FieldKind::I16)
                .requires(Requirement::InGame)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.pocket).int(self.slot).int(self.amount);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            pocket: r.int()?,
            slot: r.int()?,
            amount: r.int()?,
        })
    }
}

/// `get <pickup_type> <character_id> <item_id>`: pick an item up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPacket {
    pub pickup_type: VisualType,
    pub character_id: VisualId,
    pub item_id: VisualId,
}

impl Packet for GetPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("get")
                .field("pickup_type", FieldKind::U8)
                .field("character_id", FieldKind::NON_NEGATIVE)
                .field("item_id", FieldKind::NON_NEGATIVE)
                .requires(Requirement::InGame)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.pickup_type)
            .int(self.character_id)
            .int(self.item_id);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            pickup_type: r.int()?,
            character_id: r.int()?,
            item_id: r.int()?,
        })
    }
}

/// `preq`: take the portal the character stands on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequestPacket;

impl Packet for PortalRequestPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("preq").requires(Requirement::InGame)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, _: &mut FieldWriter) {}

    fn read_fields(_: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

macro_rules! relation_packet {
    ($(#[$meta:meta])* $name:ident, $keyword:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub character_id: VisualId,
        }

        impl Packet for $name {
            fn descriptor() -> &'static MessageDescriptor {
                static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
                    MessageDescriptor::new($keyword)
                        .field("character_id", FieldKind::NON_NEGATIVE)
                        .requires(Requirement::InGame)
                });
                &DESCRIPTOR
            }

            fn write_fields(&self, w: &mut FieldWriter) {
                w.int(self.character_id);
            }

            fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
                Ok(Self {
                    character_id: r.int()?,
                })
            }
        }
    };
}

relation_packet!(
    /// `blins <id>`: add a character to the blacklist.
    BlacklistAddPacket,
    "blins"
);
relation_packet!(
    /// `bldel <id>`: remove a character from the blacklist.
    BlacklistDeletePacket,
    "bldel"
);
relation_packet!(
    /// `fdel <id>`: end a friendship on both sides.
    FriendDeletePacket,
    "fdel"
);
