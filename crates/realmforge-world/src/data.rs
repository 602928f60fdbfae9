//! Static game data: maps, spawns, portals, monster and class tables.
//!
//! Loaded once from JSON and shared read-only. Nothing in the world
//! writes to it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::WorldError;

/// A rectangle of cells nobody can stand on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedZone {
    pub x: i16,
    pub y: i16,
    pub width: i16,
    pub height: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnKind {
    Monster,
    Npc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnData {
    pub kind: SpawnKind,
    pub vnum: i16,
    pub x: i16,
    pub y: i16,
    #[serde(default = "default_direction")]
    pub direction: u8,
    /// NPCs only move when this is set. Monsters always wander.
    #[serde(default)]
    pub moving: bool,
}

fn default_direction() -> u8 {
    2
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalData {
    pub x: i16,
    pub y: i16,
    pub destination_map: i16,
    pub destination_x: i16,
    pub destination_y: i16,
    #[serde(default)]
    pub portal_type: i16,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapData {
    pub id: i16,
    pub name: String,
    pub width: i16,
    pub height: i16,
    #[serde(default)]
    pub music: i32,
    #[serde(default = "default_true")]
    pub shop_allowed: bool,
    #[serde(default)]
    pub blocked: Vec<BlockedZone>,
    #[serde(default)]
    pub spawns: Vec<SpawnData>,
    #[serde(default)]
    pub portals: Vec<PortalData>,
}

fn default_true() -> bool {
    true
}

/// Stats of one monster or NPC kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcMonsterData {
    pub vnum: i16,
    pub name: String,
    pub max_hp: i32,
    #[serde(default)]
    pub speed: u8,
    /// Cells a wandering entity may stray from its spawn.
    #[serde(default = "default_wander_radius")]
    pub wander_radius: i16,
    /// Life ticks between two moves.
    #[serde(default = "default_move_interval")]
    pub move_interval_ticks: u32,
}

fn default_wander_radius() -> i16 {
    3
}

fn default_move_interval() -> u32 {
    10
}

/// Base stats of one character class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassData {
    pub class: u8,
    pub speed: u8,
    pub base_hp: i32,
    pub hp_per_level: i32,
    pub base_mp: i32,
    pub mp_per_level: i32,
}

impl ClassData {
    pub fn max_hp(&self, level: u8) -> i32 {
        self.base_hp + self.hp_per_level * i32::from(level.saturating_sub(1))
    }

    pub fn max_mp(&self, level: u8) -> i32 {
        self.base_mp + self.mp_per_level * i32::from(level.saturating_sub(1))
    }
}

/// Everything loaded from the game data file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameData {
    #[serde(default)]
    pub maps: Vec<MapData>,
    #[serde(default)]
    pub npc_monsters: Vec<NpcMonsterData>,
    #[serde(default)]
    pub classes: Vec<ClassData>,
    #[serde(skip)]
    monster_index: HashMap<i16, usize>,
    #[serde(skip)]
    class_index: HashMap<u8, usize>,
}

impl GameData {
    /// Reads and validates a JSON game data file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses and validates JSON game data.
    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        let data: Self = serde_json::from_str(json)?;
        data.indexed()
    }

    /// Validates the tables and builds the lookup indices.
    pub fn indexed(mut self) -> Result<Self, WorldError> {
        let mut map_ids = HashSet::new();
        for map in &self.maps {
            if !map_ids.insert(map.id) {
                return Err(WorldError::InvalidData(format!("duplicate map {}", map.id)));
            }
            if map.width <= 0 || map.height <= 0 {
                return Err(WorldError::InvalidData(format!(
                    "map {} has no cells",
                    map.id
                )));
            }
        }

        self.monster_index.clear();
        for (i, monster) in self.npc_monsters.iter().enumerate() {
            if self.monster_index.insert(monster.vnum, i).is_some() {
                return Err(WorldError::InvalidData(format!(
                    "duplicate npc/monster {}",
                    monster.vnum
                )));
            }
        }
        self.class_index = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, class)| (class.class, i))
            .collect();

        for map in &self.maps {
            if let Some(spawn) = map
                .spawns
                .iter()
                .find(|s| !self.monster_index.contains_key(&s.vnum))
            {
                return Err(WorldError::InvalidData(format!(
                    "map {} spawns unknown npc/monster {}",
                    map.id, spawn.vnum
                )));
            }
            if let Some(portal) = map
                .portals
                .iter()
                .find(|p| !map_ids.contains(&p.destination_map))
            {
                return Err(WorldError::InvalidData(format!(
                    "map {} has a portal to unknown map {}",
                    map.id, portal.destination_map
                )));
            }
        }

        tracing::info!(
            maps = self.maps.len(),
            npc_monsters = self.npc_monsters.len(),
            classes = self.classes.len(),
            "game data loaded"
        );
        Ok(self)
    }

    pub fn map(&self, id: i16) -> Option<&MapData> {
        self.maps.iter().find(|m| m.id == id)
    }

    pub fn npc_monster(&self, vnum: i16) -> Option<&NpcMonsterData> {
        self.monster_index.get(&vnum).map(|i| &self.npc_monsters[*i])
    }

    pub fn class(&self, class: u8) -> Option<&ClassData> {
        self.class_index.get(&class).map(|i| &self.classes[*i])
    }

    /// Walking speed of a class, with a fallback for classes missing from
    /// the table.
    pub fn class_speed(&self, class: u8) -> u8 {
        self.class(class).map_or(11, |c| c.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"{
        "maps": [
            { "id": 1, "name": "village", "width": 20, "height": 20,
              "blocked": [{ "x": 0, "y": 0, "width": 2, "height": 2 }],
              "spawns": [{ "kind": "monster", "vnum": 24, "x": 10, "y": 10 }],
              "portals": [{ "x": 19, "y": 19, "destination_map": 2,
                            "destination_x": 1, "destination_y": 1 }] },
            { "id": 2, "name": "field", "width": 30, "height": 30 }
        ],
        "npc_monsters": [{ "vnum": 24, "name": "slime", "max_hp": 50 }],
        "classes": [{ "class": 0, "speed": 11, "base_hp": 200, "hp_per_level": 20,
                      "base_mp": 60, "mp_per_level": 5 }]
    }"#;

    #[test]
    fn test_from_json_indexes_tables() {
        let data = GameData::from_json(DATA).unwrap();
        assert_eq!(data.map(1).unwrap().name, "village");
        assert!(data.map(1).unwrap().shop_allowed);
        assert_eq!(data.npc_monster(24).unwrap().wander_radius, 3);
        assert_eq!(data.class_speed(0), 11);
        assert_eq!(data.class(0).unwrap().max_hp(3), 240);
        assert_eq!(data.class(0).unwrap().max_mp(1), 60);
    }

    #[test]
    fn test_from_json_rejects_dangling_portal() {
        let broken = DATA.replace("\"destination_map\": 2", "\"destination_map\": 9");
        assert!(matches!(
            GameData::from_json(&broken),
            Err(WorldError::InvalidData(_))
        ));
    }

    #[test]
    fn test_from_json_rejects_unknown_spawn() {
        let broken = DATA.replace("\"vnum\": 24, \"x\"", "\"vnum\": 25, \"x\"");
        assert!(matches!(
            GameData::from_json(&broken),
            Err(WorldError::InvalidData(_))
        ));
    }

    #[test]
    fn test_from_json_rejects_malformed_input() {
        assert!(matches!(
            GameData::from_json("{ \"maps\": 3 }"),
            Err(WorldError::Parse(_))
        ));
    }
}
