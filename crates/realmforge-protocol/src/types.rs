//! Identifiers and enumerations shared by client and server packets.
//!
//! Wire enums travel as integers. [`wire_enum!`] generates the enum along
//! with the `i64` conversions the codec's reader and writer use, so a
//! packet can read a [`RequestExchangeType`] straight out of an `Int`
//! field.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The id of anything visible on a map: characters, monsters, NPCs, items.
///
/// Characters use their character id as their visual id, so this is also
/// the id carried by `select`, `fdel` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisualId(pub i64);

impl fmt::Display for VisualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V-{}", self.0)
    }
}

impl From<i64> for VisualId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<VisualId> for i64 {
    fn from(id: VisualId) -> Self {
        id.0
    }
}

/// The id of a player account. One account owns several characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Wire enums
// ---------------------------------------------------------------------------

/// Declares a fieldless enum that travels as an integer.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> i64 {
                match value {
                    $( $name::$variant => $value ),+
                }
            }
        }

        impl TryFrom<i64> for $name {
            type Error = i64;

            fn try_from(value: i64) -> Result<Self, i64> {
                match value {
                    $( $value => Ok($name::$variant), )+
                    other => Err(other),
                }
            }
        }
    };
}

wire_enum! {
    /// What kind of entity a visual id refers to.
    pub enum VisualType {
        Player = 1,
        Npc = 2,
        Monster = 3,
        Object = 9,
    }
}

wire_enum! {
    /// The step of the trade protocol a `req_exc` asks for.
    pub enum RequestExchangeType {
        Requested = 1,
        List = 2,
        Confirmed = 3,
        Cancelled = 4,
        Declined = 5,
    }
}

wire_enum! {
    /// How an `exc_close` ended the trade.
    pub enum ExchangeResultType {
        Cancelled = 0,
        Completed = 1,
    }
}

wire_enum! {
    /// Style of a `msg` notice.
    pub enum MessageType {
        White = 0,
        Red = 1,
    }
}

wire_enum! {
    /// Colour of a `say` line.
    pub enum SayColorType {
        White = 0,
        Purple = 5,
        Yellow = 10,
        Red = 11,
    }
}

wire_enum! {
    /// Inventory pocket.
    #[derive(Serialize, Deserialize)]
    pub enum PocketType {
        Equipment = 0,
        Main = 1,
        Etc = 2,
    }
}

wire_enum! {
    /// The kind of link between two characters.
    #[derive(Serialize, Deserialize)]
    pub enum RelationType {
        Friend = 0,
        Blocked = 1,
        Spouse = 5,
    }
}

wire_enum! {
    /// `m_shop` sub-command.
    pub enum ShopRequestType {
        Open = 0,
        Close = 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visual_id_display() {
        assert_eq!(VisualId(42).to_string(), "V-42");
        assert_eq!(AccountId(3).to_string(), "A-3");
    }

    #[test]
    fn test_wire_enum_round_trips_through_i64() {
        for t in [
            RequestExchangeType::Requested,
            RequestExchangeType::List,
            RequestExchangeType::Confirmed,
            RequestExchangeType::Cancelled,
            RequestExchangeType::Declined,
        ] {
            let raw: i64 = t.into();
            assert_eq!(RequestExchangeType::try_from(raw), Ok(t));
        }
    }

    #[test]
    fn test_wire_enum_rejects_unknown_value() {
        assert_eq!(RelationType::try_from(2), Err(2));
        assert_eq!(VisualType::try_from(9), Ok(VisualType::Object));
    }
}
