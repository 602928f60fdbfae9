//! Entities living in a map instance.
//!
//! Monsters and NPCs carry their own simulation state behind a per-entity
//! lock, so the life task can advance all of them in parallel without any
//! entity waiting on another.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realmforge_protocol::server::{DropPacket, InPacket, MovePacket, OutPacket, PortalPacket};
use realmforge_protocol::{VisualId, VisualType};
use realmforge_session::ItemInstance;
use tokio::time::Instant;

use crate::Map;
use crate::data::{NpcMonsterData, PortalData, SpawnData};

// ---------------------------------------------------------------------------
// Wandering
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Life {
    x: i16,
    y: i16,
    hp: i32,
    next_move_tick: u64,
    rng: StdRng,
}

/// Shared movement rules of monsters and moving NPCs: every few ticks, step
/// to a random walkable cell near the spawn.
#[derive(Debug)]
struct Wander {
    spawn: (i16, i16),
    radius: i16,
    speed: u8,
    interval: u64,
    life: Mutex<Life>,
}

impl Wander {
    fn new(spawn: &SpawnData, data: &NpcMonsterData, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let interval = u64::from(data.move_interval_ticks.max(1));
        let first_move = rng.random_range(1..=interval);
        Self {
            spawn: (spawn.x, spawn.y),
            radius: data.wander_radius.max(0),
            speed: data.speed,
            interval,
            life: Mutex::new(Life {
                x: spawn.x,
                y: spawn.y,
                hp: data.max_hp,
                next_move_tick: first_move,
                rng,
            }),
        }
    }

    fn position(&self) -> (i16, i16) {
        let life = self.life.lock();
        (life.x, life.y)
    }

    fn step(&self, tick: u64, map: &Map) -> Option<(i16, i16, u8)> {
        let mut life = self.life.lock();
        if life.hp <= 0 || tick < life.next_move_tick || self.radius == 0 {
            return None;
        }
        let jitter = life.rng.random_range(0..self.interval);
        life.next_move_tick = tick + self.interval + jitter;

        let x = self.spawn.0.saturating_add(life.rng.random_range(-self.radius..=self.radius));
        let y = self.spawn.1.saturating_add(life.rng.random_range(-self.radius..=self.radius));
        if (x, y) == (life.x, life.y) || !map.is_walkable(x, y) {
            return None;
        }
        life.x = x;
        life.y = y;
        Some((x, y, self.speed))
    }
}

// ---------------------------------------------------------------------------
// Monsters and NPCs
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MapMonster {
    pub visual_id: VisualId,
    pub vnum: i16,
    pub direction: u8,
    wander: Wander,
}

impl MapMonster {
    pub fn new(visual_id: VisualId, spawn: &SpawnData, data: &NpcMonsterData, seed: u64) -> Self {
        Self {
            visual_id,
            vnum: spawn.vnum,
            direction: spawn.direction,
            wander: Wander::new(spawn, data, seed),
        }
    }

    pub fn position(&self) -> (i16, i16) {
        self.wander.position()
    }

    pub fn hp(&self) -> i32 {
        self.wander.life.lock().hp
    }

    pub fn is_alive(&self) -> bool {
        self.hp() > 0
    }

    /// Moves the monster if its cadence says so this tick.
    pub fn advance(&self, tick: u64, map: &Map) -> Option<MovePacket> {
        let (x, y, speed) = self.wander.step(tick, map)?;
        Some(MovePacket {
            visual_type: VisualType::Monster,
            visual_id: self.visual_id,
            x,
            y,
            speed,
        })
    }

    pub fn in_packet(&self) -> InPacket {
        let (x, y) = self.position();
        InPacket {
            visual_type: VisualType::Monster,
            vnum: self.vnum,
            visual_id: self.visual_id,
            x,
            y,
            direction: self.direction,
            name: None,
        }
    }
}

#[derive(Debug)]
pub struct MapNpc {
    pub visual_id: VisualId,
    pub vnum: i16,
    pub direction: u8,
    pub moving: bool,
    wander: Wander,
}

impl MapNpc {
    pub fn new(visual_id: VisualId, spawn: &SpawnData, data: &NpcMonsterData, seed: u64) -> Self {
        Self {
            visual_id,
            vnum: spawn.vnum,
            direction: spawn.direction,
            moving: spawn.moving,
            wander: Wander::new(spawn, data, seed),
        }
    }

    pub fn position(&self) -> (i16, i16) {
        self.wander.position()
    }

    /// Moves the NPC if it is a moving one and its cadence says so.
    pub fn advance(&self, tick: u64, map: &Map) -> Option<MovePacket> {
        if !self.moving {
            return None;
        }
        let (x, y, speed) = self.wander.step(tick, map)?;
        Some(MovePacket {
            visual_type: VisualType::Npc,
            visual_id: self.visual_id,
            x,
            y,
            speed,
        })
    }

    pub fn in_packet(&self) -> InPacket {
        let (x, y) = self.position();
        InPacket {
            visual_type: VisualType::Npc,
            vnum: self.vnum,
            visual_id: self.visual_id,
            x,
            y,
            direction: self.direction,
            name: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Items and portals
// ---------------------------------------------------------------------------

/// An item lying on the ground.
#[derive(Debug)]
pub struct MapItem {
    pub visual_id: VisualId,
    pub item: ItemInstance,
    pub x: i16,
    pub y: i16,
    /// The character who dropped it.
    pub owner: VisualId,
    pub dropped_at: Instant,
}

impl MapItem {
    pub fn drop_packet(&self) -> DropPacket {
        DropPacket {
            vnum: self.item.vnum,
            item_id: self.visual_id,
            x: self.x,
            y: self.y,
            amount: self.item.amount,
            is_quest: false,
            owner: self.owner.0,
        }
    }

    pub fn out_packet(&self) -> OutPacket {
        OutPacket {
            visual_type: VisualType::Object,
            visual_id: self.visual_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portal {
    pub id: i64,
    pub x: i16,
    pub y: i16,
    pub destination_map: i16,
    pub destination_x: i16,
    pub destination_y: i16,
    pub portal_type: i16,
    pub disabled: bool,
}

impl Portal {
    pub fn from_data(id: i64, data: &PortalData) -> Self {
        Self {
            id,
            x: data.x,
            y: data.y,
            destination_map: data.destination_map,
            destination_x: data.destination_x,
            destination_y: data.destination_y,
            portal_type: data.portal_type,
            disabled: data.disabled,
        }
    }

    pub fn gp_packet(&self) -> PortalPacket {
        PortalPacket {
            x: self.x,
            y: self.y,
            map_id: self.destination_map,
            portal_type: self.portal_type,
            portal_id: self.id,
            disabled: self.disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MapData, SpawnKind};

    fn open_map() -> Map {
        Map::from_data(&MapData {
            id: 1,
            name: "field".into(),
            width: 40,
            height: 40,
            music: 0,
            shop_allowed: true,
            blocked: Vec::new(),
            spawns: Vec::new(),
            portals: Vec::new(),
        })
    }

    fn slime() -> (SpawnData, NpcMonsterData) {
        (
            SpawnData {
                kind: SpawnKind::Monster,
                vnum: 24,
                x: 20,
                y: 20,
                direction: 2,
                moving: false,
            },
            NpcMonsterData {
                vnum: 24,
                name: "slime".into(),
                max_hp: 50,
                speed: 8,
                wander_radius: 3,
                move_interval_ticks: 2,
            },
        )
    }

    #[test]
    fn test_monster_wanders_within_radius() {
        let (spawn, data) = slime();
        let monster = MapMonster::new(VisualId(1), &spawn, &data, 7);
        let map = open_map();
        let mut moves = 0;
        for tick in 1..200 {
            if let Some(mv) = monster.advance(tick, &map) {
                moves += 1;
                assert!((mv.x - 20).abs() <= 3 && (mv.y - 20).abs() <= 3);
                assert_eq!(mv.speed, 8);
            }
        }
        assert!(moves > 0);
    }

    #[test]
    fn test_dead_monster_does_not_move() {
        let (spawn, mut data) = slime();
        data.max_hp = 0;
        let monster = MapMonster::new(VisualId(1), &spawn, &data, 7);
        assert!(!monster.is_alive());
        let map = open_map();
        assert!((1..200).all(|tick| monster.advance(tick, &map).is_none()));
    }

    #[test]
    fn test_wander_near_map_edge_saturates() {
        let (mut spawn, mut data) = slime();
        spawn.x = i16::MAX;
        spawn.y = i16::MIN;
        data.wander_radius = 5;
        let monster = MapMonster::new(VisualId(1), &spawn, &data, 7);
        let map = open_map();
        for tick in 1..200 {
            assert!(monster.advance(tick, &map).is_none());
        }
        assert_eq!(monster.position(), (i16::MAX, i16::MIN));
    }

    #[test]
    fn test_standing_npc_never_moves() {
        let (spawn, data) = slime();
        let npc = MapNpc::new(VisualId(2), &spawn, &data, 7);
        let map = open_map();
        assert!((1..200).all(|tick| npc.advance(tick, &map).is_none()));
        assert_eq!(npc.position(), (20, 20));
    }

    #[test]
    fn test_same_seed_same_path() {
        let (spawn, data) = slime();
        let a = MapMonster::new(VisualId(1), &spawn, &data, 99);
        let b = MapMonster::new(VisualId(1), &spawn, &data, 99);
        let map = open_map();
        for tick in 1..100 {
            assert_eq!(a.advance(tick, &map), b.advance(tick, &map));
        }
    }
}
