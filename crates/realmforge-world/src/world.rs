//! The world: every map and every live map instance.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use realmforge_session::{Broadcaster, MapInstanceId};
use tokio::task::JoinHandle;

use crate::instance::child_rng;
use crate::{GameData, InstanceType, Map, MapInstance, WorldConfig, WorldError, spawn_life};

/// Owns the lifetime of every [`MapInstance`].
///
/// Each map gets one base instance at startup that lives as long as the
/// world. Further instances are created with
/// [`create_instance`](Self::create_instance) and removed with
/// [`remove_instance`](Self::remove_instance). Must be started inside a
/// Tokio runtime because every instance spawns its life task.
pub struct World {
    data: Arc<GameData>,
    config: WorldConfig,
    maps: HashMap<i16, Arc<Map>>,
    broadcaster: Arc<Broadcaster>,
    pool: Arc<rayon::ThreadPool>,
    instances: DashMap<MapInstanceId, Arc<MapInstance>>,
    life_tasks: DashMap<MapInstanceId, JoinHandle<()>>,
    base_instances: HashMap<i16, MapInstanceId>,
    rng: Mutex<StdRng>,
}

impl World {
    /// Builds the maps, the simulation pool and one base instance per map.
    pub fn start(
        data: GameData,
        config: WorldConfig,
        broadcaster: Arc<Broadcaster>,
    ) -> Result<Self, WorldError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.simulation_threads)
            .thread_name(|i| format!("realmforge-life-{i}"))
            .build()?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let maps = data
            .maps
            .iter()
            .map(|m| (m.id, Arc::new(Map::from_data(m))))
            .collect();

        let mut world = Self {
            data: Arc::new(data),
            config,
            maps,
            broadcaster,
            pool: Arc::new(pool),
            instances: DashMap::new(),
            life_tasks: DashMap::new(),
            base_instances: HashMap::new(),
            rng: Mutex::new(rng),
        };

        let mut map_ids: Vec<i16> = world.maps.keys().copied().collect();
        map_ids.sort_unstable();
        for map_id in map_ids {
            let instance = world.spawn_instance(map_id, InstanceType::Base)?;
            world.base_instances.insert(map_id, instance.id());
        }

        tracing::info!(
            maps = world.maps.len(),
            threads = world.pool.current_num_threads(),
            "world started"
        );
        Ok(world)
    }

    pub fn data(&self) -> &Arc<GameData> {
        &self.data
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn map(&self, map_id: i16) -> Option<&Arc<Map>> {
        self.maps.get(&map_id)
    }

    pub fn instance(&self, id: MapInstanceId) -> Option<Arc<MapInstance>> {
        self.instances.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// The base instance of a map.
    pub fn base_instance(&self, map_id: i16) -> Result<Arc<MapInstance>, WorldError> {
        let id = self
            .base_instances
            .get(&map_id)
            .ok_or(WorldError::MapNotFound(map_id))?;
        self.instance(*id).ok_or(WorldError::InstanceNotFound(*id))
    }

    /// Creates an extra instance of a map and starts its life task.
    pub fn create_instance(&self, map_id: i16) -> Result<Arc<MapInstance>, WorldError> {
        self.spawn_instance(map_id, InstanceType::Instanced)
    }

    fn spawn_instance(
        &self,
        map_id: i16,
        instance_type: InstanceType,
    ) -> Result<Arc<MapInstance>, WorldError> {
        let map = self.maps.get(&map_id).ok_or(WorldError::MapNotFound(map_id))?;
        let map_data = self.data.map(map_id).ok_or(WorldError::MapNotFound(map_id))?;
        let rng = child_rng(&mut self.rng.lock());

        let instance = Arc::new(MapInstance::new(
            Arc::clone(map),
            map_data,
            &self.data,
            instance_type,
            self.config.sleep_grace(),
            self.config.item_lifetime(),
            rng,
        ));
        let task = spawn_life(
            &instance,
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.pool),
            self.config.tick_config(),
        );
        self.instances.insert(instance.id(), Arc::clone(&instance));
        self.life_tasks.insert(instance.id(), task);
        tracing::info!(instance_id = %instance.id(), map_id, ?instance_type, "map instance started");
        Ok(instance)
    }

    /// Closes and forgets an instance created by
    /// [`create_instance`](Self::create_instance).
    pub fn remove_instance(&self, id: MapInstanceId) -> Result<(), WorldError> {
        if self.base_instances.values().any(|base| *base == id) {
            return Err(WorldError::BaseInstance(id));
        }
        let (_, instance) = self
            .instances
            .remove(&id)
            .ok_or(WorldError::InstanceNotFound(id))?;
        instance.close();
        self.life_tasks.remove(&id);
        tracing::info!(instance_id = %id, "map instance removed");
        Ok(())
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Stops every life task. The world is unusable afterwards.
    pub fn shutdown(&self) {
        for entry in self.instances.iter() {
            entry.value().close();
        }
        for entry in self.life_tasks.iter() {
            entry.value().abort();
        }
        self.life_tasks.clear();
        self.instances.clear();
        tracing::info!("world shut down");
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("maps", &self.maps.len())
            .field("instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}
