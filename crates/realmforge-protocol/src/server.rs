//! Packets sent by the server.

use std::sync::LazyLock;

use crate::client::RequestExchangePacket;
use crate::{
    ExchangeResultType, FieldKind, FieldReader, FieldWriter, MessageDescriptor, MessageType,
    Packet, PocketType, ProtocolError, RelationType, SayColorType, VisualId, VisualType,
};

/// `modal <type> <message>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalPacket {
    pub modal_type: u8,
    pub message: String,
}

impl Packet for ModalPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("modal")
                .field("modal_type", FieldKind::U8)
                .field("message", FieldKind::Text)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.modal_type).text(&self.message);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            modal_type: r.int()?,
            message: r.text()?,
        })
    }
}

/// `dlg #yes #no <question>`: a yes/no prompt whose answers are packets
/// the client sends back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlgPacket {
    pub yes: RequestExchangePacket,
    pub no: RequestExchangePacket,
    pub question: String,
}

impl Packet for DlgPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("dlg")
                .field("yes", FieldKind::packet::<RequestExchangePacket>())
                .field("no", FieldKind::packet::<RequestExchangePacket>())
                .field("question", FieldKind::Text)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.packet(&self.yes).packet(&self.no).text(&self.question);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            yes: r.packet()?,
            no: r.packet()?,
            question: r.text()?,
        })
    }
}

/// `msg <type> <message>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgPacket {
    pub message_type: MessageType,
    pub message: String,
}

impl Packet for MsgPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("msg")
                .field("message_type", FieldKind::U8)
                .field("message", FieldKind::Text)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.message_type).text(&self.message);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            message_type: r.int()?,
            message: r.text()?,
        })
    }
}

/// `info <message>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoPacket {
    pub message: String,
}

impl Packet for InfoPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> =
            LazyLock::new(|| MessageDescriptor::new("info").field("message", FieldKind::Text));
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.text(&self.message);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self { message: r.text()? })
    }
}

/// `say <visual_type> <visual_id> <color> <message>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SayPacket {
    pub visual_type: VisualType,
    pub visual_id: VisualId,
    pub color: SayColorType,
    pub message: String,
}

impl Packet for SayPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("say")
                .field("visual_type", FieldKind::U8)
                .field("visual_id", FieldKind::I64)
                .field("color", FieldKind::U8)
                .field("message", FieldKind::Text)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.visual_type)
            .int(self.visual_id)
            .int(self.color)
            .text(&self.message);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            visual_type: r.int()?,
            visual_id: r.int()?,
            color: r.int()?,
            message: r.text()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// One offered stack shown in the trade window: `slot.pocket.vnum.amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeListItem {
    pub slot: i16,
    pub pocket: PocketType,
    pub vnum: i16,
    pub amount: i16,
}

impl Packet for ExchangeListItem {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::sub()
                .field("slot", FieldKind::I16)
                .field("pocket", FieldKind::U8)
                .field("vnum", FieldKind::I16)
                .field("amount", FieldKind::I16)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.slot)
            .int(self.pocket)
            .int(self.vnum)
            .int(self.amount);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.int()?,
            pocket: r.int()?,
            vnum: r.int()?,
            amount: r.int()?,
        })
    }
}

/// `exc_list <unknown> <visual_id> <gold> [slot.pocket.vnum.amount ...]`:
/// opens or refreshes the trade window. Gold is `-1` until the partner
/// makes an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeListPacket {
    pub unknown: u8,
    pub visual_id: VisualId,
    pub gold: i64,
    pub items: Vec<ExchangeListItem>,
}

impl Packet for ExchangeListPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("exc_list")
                .field("unknown", FieldKind::U8)
                .field("visual_id", FieldKind::I64)
                .field("gold", FieldKind::int(-1, i64::MAX))
                .field("items", FieldKind::list::<ExchangeListItem>('.'))
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.unknown)
            .int(self.visual_id)
            .int(self.gold)
            .list(&self.items);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            unknown: r.int()?,
            visual_id: r.int()?,
            gold: r.int()?,
            items: r.list()?,
        })
    }
}

/// `exc_close <type>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeClosePacket {
    pub close_type: ExchangeResultType,
}

impl Packet for ExchangeClosePacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("exc_close").field("close_type", FieldKind::int(0, 1))
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.close_type);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            close_type: r.int()?,
        })
    }
}

/// `gold <amount>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldPacket {
    pub gold: i64,
}

impl Packet for GoldPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("gold").field("gold", FieldKind::NON_NEGATIVE)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.gold);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self { gold: r.int()? })
    }
}

// ---------------------------------------------------------------------------
// Map entities
// ---------------------------------------------------------------------------

/// `drop <vnum> <item_id> <x> <y> <amount> <is_quest> <owner>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPacket {
    pub vnum: i16,
    pub item_id: VisualId,
    pub x: i16,
    pub y: i16,
    pub amount: i16,
    pub is_quest: bool,
    /// `-1` when anyone may pick the item up.
    pub owner: i64,
}

impl Packet for DropPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("drop")
                .field("vnum", FieldKind::I16)
                .field("item_id", FieldKind::I64)
                .field("x", FieldKind::I16)
                .field("y", FieldKind::I16)
                .field("amount", FieldKind::I16)
                .field("is_quest", FieldKind::Bool)
                .field("owner", FieldKind::int(-1, i64::MAX))
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.vnum)
            .int(self.item_id)
            .int(self.x)
            .int(self.y)
            .int(self.amount)
            .bool(self.is_quest)
            .int(self.owner);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            vnum: r.int()?,
            item_id: r.int()?,
            x: r.int()?,
            y: r.int()?,
            amount: r.int()?,
            is_quest: r.bool()?,
            owner: r.int()?,
        })
    }
}

/// `get <visual_type> <visual_id> <item_id> <unknown>`: someone picked an item up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupPacket {
    pub visual_type: VisualType,
    pub visual_id: VisualId,
    pub item_id: VisualId,
    pub unknown: u8,
}

impl Packet for PickupPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("get")
                .field("visual_type", FieldKind::U8)
                .field("visual_id", FieldKind::I64)
                .field("item_id", FieldKind::I64)
                .field("unknown", FieldKind::U8)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.visual_type)
            .int(self.visual_id)
            .int(self.item_id)
            .int(self.unknown);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            visual_type: r.int()?,
            visual_id: r.int()?,
            item_id: r.int()?,
            unknown: r.int()?,
        })
    }
}

/// `out <visual_type> <visual_id>`: an entity left the viewer's map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPacket {
    pub visual_type: VisualType,
    pub visual_id: VisualId,
}

impl Packet for OutPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("out")
                .field("visual_type", FieldKind::U8)
                .field("visual_id", FieldKind::I64)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.visual_type).int(self.visual_id);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            visual_type: r.int()?,
            visual_id: r.int()?,
        })
    }
}

/// `in <visual_type> <vnum> <visual_id> <x> <y> <direction> [name]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InPacket {
    pub visual_type: VisualType,
    pub vnum: i16,
    pub visual_id: VisualId,
    pub x: i16,
    pub y: i16,
    pub direction: u8,
    /// Only characters carry a name.
    pub name: Option<String>,
}

impl Packet for InPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("in")
                .field("visual_type", FieldKind::U8)
                .field("vnum", FieldKind::I16)
                .field("visual_id", FieldKind::I64)
                .field("x", FieldKind::I16)
                .field("y", FieldKind::I16)
                .field("direction", FieldKind::U8)
                .optional("name", FieldKind::Str)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.visual_type)
            .int(self.vnum)
            .int(self.visual_id)
            .int(self.x)
            .int(self.y)
            .int(self.direction)
            .opt_string(self.name.as_deref());
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            visual_type: r.int()?,
            vnum: r.int()?,
            visual_id: r.int()?,
            x: r.int()?,
            y: r.int()?,
            direction: r.int()?,
            name: r.opt_string()?,
        })
    }
}

/// `gp <x> <y> <map_id> <portal_type> <portal_id> <disabled>`: a portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalPacket {
    pub x: i16,
    pub y: i16,
    pub map_id: i16,
    pub portal_type: i16,
    pub portal_id: i64,
    pub disabled: bool,
}

impl Packet for PortalPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("gp")
                .field("x", FieldKind::I16)
                .field("y", FieldKind::I16)
                .field("map_id", FieldKind::I16)
                .field("portal_type", FieldKind::I16)
                .field("portal_id", FieldKind::NON_NEGATIVE)
                .field("disabled", FieldKind::Bool)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.x)
            .int(self.y)
            .int(self.map_id)
            .int(self.portal_type)
            .int(self.portal_id)
            .bool(self.disabled);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: r.int()?,
            y: r.int()?,
            map_id: r.int()?,
            portal_type: r.int()?,
            portal_id: r.int()?,
            disabled: r.bool()?,
        })
    }
}

/// `c_map <type> <map_id> <is_instance>`: the client should load a map.
///
/// `is_instance` is set for every instance except the base one of a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMapPacket {
    pub map_type: u8,
    pub map_id: i16,
    pub is_instance: bool,
}

impl Packet for ChangeMapPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("c_map")
                .field("map_type", FieldKind::U8)
                .field("map_id", FieldKind::I16)
                .field("is_instance", FieldKind::Bool)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.map_type).int(self.map_id).bool(self.is_instance);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            map_type: r.int()?,
            map_id: r.int()?,
            is_instance: r.bool()?,
        })
    }
}

/// `at <id> <map_id> <x> <y> <direction> 0 <music> -1`: the viewer's own position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtPacket {
    pub character_id: VisualId,
    pub map_id: i16,
    pub x: i16,
    pub y: i16,
    pub direction: u8,
    pub unknown1: u8,
    pub music: i32,
    pub unknown2: i8,
}

impl Packet for AtPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("at")
                .field("character_id", FieldKind::I64)
                .field("map_id", FieldKind::I16)
                .field("x", FieldKind::I16)
                .field("y", FieldKind::I16)
                .field("direction", FieldKind::U8)
                .field("unknown1", FieldKind::U8)
                .field("music", FieldKind::I32)
                .field("unknown2", FieldKind::int(-1, 0))
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.character_id)
            .int(self.map_id)
            .int(self.x)
            .int(self.y)
            .int(self.direction)
            .int(self.unknown1)
            .int(self.music)
            .int(self.unknown2);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            character_id: r.int()?,
            map_id: r.int()?,
            x: r.int()?,
            y: r.int()?,
            direction: r.int()?,
            unknown1: r.int()?,
            music: r.int()?,
            unknown2: r.int()?,
        })
    }
}

/// `mv <visual_type> <visual_id> <x> <y> <speed>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePacket {
    pub visual_type: VisualType,
    pub visual_id: VisualId,
    pub x: i16,
    pub y: i16,
    pub speed: u8,
}

impl Packet for MovePacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("mv")
                .field("visual_type", FieldKind::U8)
                .field("visual_id", FieldKind::I64)
                .field("x", FieldKind::I16)
                .field("y", FieldKind::I16)
                .field("speed", FieldKind::U8)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.visual_type)
            .int(self.visual_id)
            .int(self.x)
            .int(self.y)
            .int(self.speed);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            visual_type: r.int()?,
            visual_id: r.int()?,
            x: r.int()?,
            y: r.int()?,
            speed: r.int()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// `finfo <character_id> <connected>`: a friend came online or went offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinfoPacket {
    pub character_id: VisualId,
    pub is_connected: bool,
}

impl Packet for FinfoPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("finfo")
                .field("character_id", FieldKind::I64)
                .field("is_connected", FieldKind::Bool)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.character_id).bool(self.is_connected);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            character_id: r.int()?,
            is_connected: r.bool()?,
        })
    }
}

/// One friend in `finit`: `id|type|online|name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinitItem {
    pub character_id: VisualId,
    pub relation_type: RelationType,
    pub is_connected: bool,
    pub name: String,
}

impl Packet for FinitItem {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::sub()
                .field("character_id", FieldKind::I64)
                .field("relation_type", FieldKind::U8)
                .field("is_connected", FieldKind::Bool)
                .field("name", FieldKind::Str)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.character_id)
            .int(self.relation_type)
            .bool(self.is_connected)
            .string(&self.name);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            character_id: r.int()?,
            relation_type: r.int()?,
            is_connected: r.bool()?,
            name: r.string()?,
        })
    }
}

/// `finit [id|type|online|name ...]`: the full friend list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinitPacket {
    pub friends: Vec<FinitItem>,
}

impl Packet for FinitPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("finit").field("friends", FieldKind::list::<FinitItem>('|'))
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.list(&self.friends);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            friends: r.list()?,
        })
    }
}

/// One entry in `blinit`: `id|name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinitItem {
    pub character_id: VisualId,
    pub name: String,
}

impl Packet for BlinitItem {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::sub()
                .field("character_id", FieldKind::I64)
                .field("name", FieldKind::Str)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.character_id).string(&self.name);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            character_id: r.int()?,
            name: r.string()?,
        })
    }
}

/// `blinit [id|name ...]`: the full blacklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinitPacket {
    pub blocked: Vec<BlinitItem>,
}

impl Packet for BlinitPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("blinit").field("blocked", FieldKind::list::<BlinitItem>('|'))
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.list(&self.blocked);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            blocked: r.list()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Shop and inventory
// ---------------------------------------------------------------------------

/// `shop <visual_type> <visual_id> <is_open> [name]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopPacket {
    pub visual_type: VisualType,
    pub visual_id: VisualId,
    pub is_open: bool,
    pub name: Option<String>,
}

impl Packet for ShopPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("shop")
                .field("visual_type", FieldKind::U8)
                .field("visual_id", FieldKind::I64)
                .field("is_open", FieldKind::Bool)
                .optional("name", FieldKind::Text)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.visual_type)
            .int(self.visual_id)
            .bool(self.is_open)
            .opt_text(self.name.as_deref());
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            visual_type: r.int()?,
            visual_id: r.int()?,
            is_open: r.bool()?,
            name: r.opt_text()?,
        })
    }
}

/// One slot in `ivn`: `slot.vnum.amount`. An amount of 0 clears the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvnItem {
    pub slot: i16,
    pub vnum: i16,
    pub amount: i16,
}

impl Packet for IvnItem {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::sub()
                .field("slot", FieldKind::I16)
                .field("vnum", FieldKind::I16)
                .field("amount", FieldKind::I16)
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.slot).int(self.vnum).int(self.amount);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.int()?,
            vnum: r.int()?,
            amount: r.int()?,
        })
    }
}

/// `ivn <pocket> <count> [slot.vnum.amount ...]`: inventory slot refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvnPacket {
    pub pocket: PocketType,
    pub items: Vec<IvnItem>,
}

impl Packet for IvnPacket {
    fn descriptor() -> &'static MessageDescriptor {
        static DESCRIPTOR: LazyLock<MessageDescriptor> = LazyLock::new(|| {
            MessageDescriptor::new("ivn")
                .field("pocket", FieldKind::U8)
                .field("items", FieldKind::counted_list::<IvnItem>('.'))
        });
        &DESCRIPTOR
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.int(self.pocket).list(&self.items);
    }

    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError> {
        Ok(Self {
            pocket: r.int()?,
            items: r.list()?,
        })
    }
}
