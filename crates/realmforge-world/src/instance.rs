//! One live copy of a map.
//!
//! A [`MapInstance`] owns its entities (monsters, NPCs, dropped items and
//! portals), the [`BroadcastGroup`] of sessions standing in it and the
//! [`IdleState`] that decides whether its life task simulates anything.
//!
//! Entity collections are `DashMap`s keyed by an instance-scoped visual id.
//! Ids come from one counter per instance, so they are unique across all
//! entity kinds and never reused while the instance lives. Readers take
//! snapshots (`Vec<Arc<_>>`) and never hold a shard lock while doing work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use realmforge_protocol::server::MovePacket;
use realmforge_protocol::{Packet, PocketType, VisualId};
use realmforge_session::{
    BroadcastGroup, Broadcaster, Character, InventoryError, MapInstanceId, Session, SessionId,
};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::data::{GameData, MapData, SpawnKind};
use crate::{IdleState, Map, MapItem, MapMonster, MapNpc, Portal};

/// Side length of the square searched for a free cell when dropping.
const DROP_AREA: i16 = 5;

/// Furthest distance, in cells, from which an item can be picked up.
pub const PICKUP_RANGE: i16 = 2;

/// Furthest distance, in cells, from which a portal can be taken.
pub const PORTAL_RANGE: i16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceType {
    /// The always-present instance players land in when entering a map.
    Base,
    /// Created on demand and removed when no longer needed.
    Instanced,
}

/// Why [`MapInstance::put_item`] refused a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DropRejection {
    #[error("no item in that slot")]
    ItemNotFound,
    #[error("amount is out of range")]
    InvalidAmount,
    #[error("no free cell around the character")]
    NoFreeCell,
}

/// Why [`MapInstance::take_item`] refused a pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PickupRejection {
    #[error("no such item on the ground")]
    NotFound,
    #[error("item is too far away")]
    TooFar,
    #[error("inventory is full")]
    InventoryFull,
}

/// What one life tick changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub moved: usize,
    pub expired: usize,
}

pub struct MapInstance {
    id: MapInstanceId,
    instance_type: InstanceType,
    map: Arc<Map>,
    monsters: DashMap<VisualId, Arc<MapMonster>>,
    npcs: DashMap<VisualId, Arc<MapNpc>>,
    items: DashMap<VisualId, Arc<MapItem>>,
    portals: Vec<Portal>,
    group: BroadcastGroup,
    next_entity_id: AtomicI64,
    rng: Mutex<StdRng>,
    idle: Mutex<IdleState>,
    wake: Arc<Notify>,
    closed: AtomicBool,
    life_ticks: AtomicU64,
    item_lifetime: Option<Duration>,
}

impl MapInstance {
    /// Builds an instance of `map` and spawns its monsters, NPCs and
    /// portals from the game data.
    pub fn new(
        map: Arc<Map>,
        map_data: &MapData,
        data: &GameData,
        instance_type: InstanceType,
        sleep_grace: Duration,
        item_lifetime: Option<Duration>,
        rng: StdRng,
    ) -> Self {
        let instance = Self {
            id: MapInstanceId::new(),
            instance_type,
            map,
            monsters: DashMap::new(),
            npcs: DashMap::new(),
            items: DashMap::new(),
            portals: Vec::new(),
            group: BroadcastGroup::new(),
            next_entity_id: AtomicI64::new(1),
            rng: Mutex::new(rng),
            idle: Mutex::new(IdleState::new(sleep_grace)),
            wake: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
            life_ticks: AtomicU64::new(0),
            item_lifetime,
        };
        instance.spawn(map_data, data)
    }

    fn spawn(mut self, map_data: &MapData, data: &GameData) -> Self {
        for spawn in &map_data.spawns {
            let Some(kind) = data.npc_monster(spawn.vnum) else {
                tracing::warn!(map_id = map_data.id, vnum = spawn.vnum, "unknown spawn, skipping");
                continue;
            };
            let id = self.next_id();
            let seed = self.rng.get_mut().random();
            match spawn.kind {
                SpawnKind::Monster => {
                    self.monsters
                        .insert(id, Arc::new(MapMonster::new(id, spawn, kind, seed)));
                }
                SpawnKind::Npc => {
                    self.npcs
                        .insert(id, Arc::new(MapNpc::new(id, spawn, kind, seed)));
                }
            }
        }
        let portals = map_data
            .portals
            .iter()
            .map(|p| Portal::from_data(self.next_id().0, p))
            .collect();
        self.portals = portals;
        tracing::debug!(
            instance_id = %self.id,
            map_id = self.map.id,
            monsters = self.monsters.len(),
            npcs = self.npcs.len(),
            portals = self.portals.len(),
            "map instance created"
        );
        self
    }

    fn next_id(&self) -> VisualId {
        VisualId(self.next_entity_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> MapInstanceId {
        self.id
    }

    pub fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    // -- Entities ----------------------------------------------------------

    pub fn monsters(&self) -> Vec<Arc<MapMonster>> {
        self.monsters.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn npcs(&self) -> Vec<Arc<MapNpc>> {
        self.npcs.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn items(&self) -> Vec<Arc<MapItem>> {
        self.items.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn item(&self, id: VisualId) -> Option<Arc<MapItem>> {
        self.items.get(&id).map(|e| Arc::clone(e.value()))
    }

    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    /// An enabled portal within reach of `(x, y)`.
    pub fn portal_near(&self, x: i16, y: i16) -> Option<&Portal> {
        self.portals.iter().find(|p| {
            !p.disabled && (p.x - x).abs() <= PORTAL_RANGE && (p.y - y).abs() <= PORTAL_RANGE
        })
    }

    // -- Items -------------------------------------------------------------

    /// Drops `amount` of the stack in `(pocket, slot)` next to `character`.
    ///
    /// The free cell is searched in a 5×5 square centred on the character,
    /// in shuffled order. On success the stack shrinks by exactly `amount`
    /// (and disappears at zero) and the new ground item is registered under
    /// a fresh id. The caller broadcasts it.
    pub fn put_item(
        &self,
        amount: i16,
        pocket: PocketType,
        slot: i16,
        character: &Character,
    ) -> Result<Arc<MapItem>, DropRejection> {
        let position = character.position();
        let mut inventory = character.inventory();
        let available = inventory
            .get(pocket, slot)
            .ok_or(DropRejection::ItemNotFound)?
            .amount;
        if amount <= 0 || amount > available {
            return Err(DropRejection::InvalidAmount);
        }
        let (x, y) = self
            .free_cell_near(position.x, position.y)
            .ok_or(DropRejection::NoFreeCell)?;
        let item = inventory
            .split(pocket, slot, amount)
            .map_err(|e| match e {
                InventoryError::EmptySlot => DropRejection::ItemNotFound,
                _ => DropRejection::InvalidAmount,
            })?;
        drop(inventory);

        let map_item = Arc::new(MapItem {
            visual_id: self.next_id(),
            item,
            x,
            y,
            owner: character.visual_id,
            dropped_at: Instant::now(),
        });
        self.items.insert(map_item.visual_id, Arc::clone(&map_item));
        tracing::debug!(
            instance_id = %self.id,
            item_id = %map_item.visual_id,
            vnum = map_item.item.vnum,
            amount,
            "item dropped"
        );
        Ok(map_item)
    }

    fn free_cell_near(&self, x: i16, y: i16) -> Option<(i16, i16)> {
        let reach = DROP_AREA / 2;
        let mut offsets: Vec<(i16, i16)> = (-reach..=reach)
            .flat_map(|dx| (-reach..=reach).map(move |dy| (dx, dy)))
            .collect();
        offsets.shuffle(&mut *self.rng.lock());
        offsets
            .into_iter()
            .map(|(dx, dy)| (x.saturating_add(dx), y.saturating_add(dy)))
            .find(|cell| !self.map.is_blocked_zone((x, y), *cell))
    }

    /// Moves a ground item into `character`'s inventory.
    ///
    /// A full inventory leaves the item where it is.
    pub fn take_item(
        &self,
        item_id: VisualId,
        character: &Character,
    ) -> Result<Arc<MapItem>, PickupRejection> {
        let item = self.item(item_id).ok_or(PickupRejection::NotFound)?;
        if character.position().distance_to(item.x, item.y) > PICKUP_RANGE {
            return Err(PickupRejection::TooFar);
        }
        let mut inventory = character.inventory();
        if !inventory.can_add_all([&item.item]) {
            return Err(PickupRejection::InventoryFull);
        }
        // Someone else may have been faster.
        let (_, item) = self
            .items
            .remove(&item_id)
            .ok_or(PickupRejection::NotFound)?;
        if inventory.add(item.item.clone()).is_err() {
            self.items.insert(item_id, Arc::clone(&item));
            return Err(PickupRejection::InventoryFull);
        }
        Ok(item)
    }

    /// Removes items older than the configured lifetime and returns them.
    pub fn expire_items(&self, now: Instant) -> Vec<Arc<MapItem>> {
        let Some(lifetime) = self.item_lifetime else {
            return Vec::new();
        };
        let stale: Vec<VisualId> = self
            .items
            .iter()
            .filter(|e| now.saturating_duration_since(e.dropped_at) >= lifetime)
            .map(|e| *e.key())
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.items.remove(&id).map(|(_, item)| item))
            .collect()
    }

    // -- Sessions ----------------------------------------------------------

    pub fn group(&self) -> &BroadcastGroup {
        &self.group
    }

    /// Adds a session to the instance and cancels any pending sleep.
    pub fn register_session(&self, id: SessionId) -> bool {
        let joined = self.group.join(id);
        let was_sleeping = {
            let mut idle = self.idle.lock();
            let was_sleeping = idle.is_sleeping(Instant::now());
            idle.wake();
            was_sleeping
        };
        if was_sleeping {
            tracing::debug!(instance_id = %self.id, "map instance woken up");
        }
        self.wake.notify_one();
        joined
    }

    /// Removes a session. The last one out arms the sleep request.
    pub fn unregister_session(&self, id: SessionId) -> bool {
        let left = self.group.leave(id);
        if left && self.group.is_empty() {
            self.idle.lock().request_sleep(Instant::now());
            tracing::debug!(instance_id = %self.id, "last session left, sleep requested");
        }
        left
    }

    pub fn session_count(&self) -> usize {
        self.group.len()
    }

    pub fn is_sleeping(&self) -> bool {
        self.idle.lock().is_sleeping(Instant::now())
    }

    /// Sends `packet` to every session in the instance except `except`.
    pub fn broadcast<P: Packet>(
        &self,
        broadcaster: &Broadcaster,
        packet: &P,
        except: Option<SessionId>,
    ) {
        broadcaster.broadcast(&self.group, packet, except);
    }

    /// Sends everything standing in the instance to a newly arrived session.
    pub fn send_entities(&self, session: &Session) {
        for portal in &self.portals {
            session.send(&portal.gp_packet());
        }
        for monster in self.monsters().iter().filter(|m| m.is_alive()) {
            session.send(&monster.in_packet());
        }
        for npc in self.npcs() {
            session.send(&npc.in_packet());
        }
        for item in self.items() {
            session.send(&item.drop_packet());
        }
    }

    // -- Life --------------------------------------------------------------

    /// Runs one life tick: advances every monster and NPC on `pool`, drops
    /// expired items and broadcasts the results.
    ///
    /// The entity step runs on the blocking pool, which hands it to `pool`;
    /// the calling task only awaits the result.
    pub async fn advance(
        &self,
        tick: u64,
        pool: &Arc<rayon::ThreadPool>,
        broadcaster: &Broadcaster,
    ) -> TickReport {
        self.life_ticks.fetch_add(1, Ordering::Relaxed);
        let monsters = self.monsters();
        let npcs = self.npcs();
        let map = Arc::clone(&self.map);
        let pool = Arc::clone(pool);
        let step = tokio::task::spawn_blocking(move || {
            pool.install(|| {
                monsters
                    .par_iter()
                    .filter_map(|m| m.advance(tick, &map))
                    .chain(npcs.par_iter().filter_map(|n| n.advance(tick, &map)))
                    .collect::<Vec<MovePacket>>()
            })
        });
        let moves = step.await.unwrap_or_else(|e| {
            tracing::error!(instance_id = %self.id, tick, error = %e, "entity step failed");
            Vec::new()
        });
        for mv in &moves {
            self.broadcast(broadcaster, mv, None);
        }

        let expired = self.expire_items(Instant::now());
        for item in &expired {
            self.broadcast(broadcaster, &item.out_packet(), None);
        }

        TickReport {
            moved: moves.len(),
            expired: expired.len(),
        }
    }

    /// Number of life ticks that actually simulated.
    pub fn life_ticks(&self) -> u64 {
        self.life_ticks.load(Ordering::Relaxed)
    }

    /// The signal the life task parks on while the instance sleeps.
    pub(crate) fn wake_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Stops the life task for good.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.wake.notify_one();
            tracing::debug!(instance_id = %self.id, "map instance closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for MapInstance {
    fn drop(&mut self) {
        self.wake.notify_one();
    }
}

impl std::fmt::Debug for MapInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapInstance")
            .field("id", &self.id)
            .field("map_id", &self.map.id)
            .field("instance_type", &self.instance_type)
            .field("sessions", &self.group.len())
            .finish_non_exhaustive()
    }
}

/// Derives a child RNG, so every instance gets its own stream from the
/// world's seed.
pub(crate) fn child_rng(parent: &mut StdRng) -> StdRng {
    StdRng::seed_from_u64(parent.random())
}
