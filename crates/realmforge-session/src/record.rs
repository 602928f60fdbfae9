//! The persisted form of a character.

use realmforge_protocol::{AccountId, RelationType, VisualId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ItemInstance;

/// A friend or blacklist entry, as seen from the character owning it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRelation {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub related: VisualId,
    pub related_name: String,
    pub relation_type: RelationType,
}

impl CharacterRelation {
    pub fn new(related: VisualId, related_name: &str, relation_type: RelationType) -> Self {
        Self {
            id: Uuid::new_v4(),
            related,
            related_name: related_name.to_owned(),
            relation_type,
        }
    }
}

/// Everything the persistence collaborator loads and saves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: VisualId,
    pub account_id: AccountId,
    pub name: String,
    #[serde(default)]
    pub class: u8,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default = "default_map")]
    pub map_id: i16,
    #[serde(default)]
    pub x: i16,
    #[serde(default)]
    pub y: i16,
    #[serde(default)]
    pub gold: i64,
    #[serde(default)]
    pub items: Vec<ItemInstance>,
    #[serde(default)]
    pub relations: Vec<CharacterRelation>,
}

fn default_level() -> u8 {
    1
}

fn default_map() -> i16 {
    1
}

impl CharacterRecord {
    /// A fresh level 1 character on map 1.
    pub fn new(id: VisualId, account_id: AccountId, name: &str) -> Self {
        Self {
            id,
            account_id,
            name: name.to_owned(),
            class: 0,
            level: default_level(),
            map_id: default_map(),
            x: 0,
            y: 0,
            gold: 0,
            items: Vec::new(),
            relations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmforge_protocol::PocketType;

    #[test]
    fn test_record_from_sparse_json() {
        let json = r#"{
            "id": 7,
            "account_id": 2,
            "name": "mira",
            "items": [{ "vnum": 1012, "amount": 5, "pocket": "Main" }],
            "relations": [{ "related": 8, "related_name": "tobi", "relation_type": "Friend" }]
        }"#;
        let record: CharacterRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.level, 1);
        assert_eq!(record.map_id, 1);
        assert_eq!(record.items[0].pocket, PocketType::Main);
        assert_eq!(record.items[0].slot, 0);
        assert_ne!(record.relations[0].id, Uuid::nil());
    }
}
