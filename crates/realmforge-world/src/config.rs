//! World configuration.

use std::time::Duration;

use realmforge_tick::TickConfig;
use serde::{Deserialize, Serialize};

/// Settings shared by every map instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Milliseconds between two life ticks of an awake instance.
    pub tick_interval_ms: u64,

    /// Seconds an instance stays awake after its last session left.
    pub sleep_grace_secs: u64,

    /// Threads in the entity simulation pool. 0 lets rayon decide.
    pub simulation_threads: usize,

    /// Seconds before a dropped item disappears. 0 keeps items forever.
    pub item_lifetime_secs: u64,

    /// Seed for every random choice in the world. Unset seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 400,
            sleep_grace_secs: 30,
            simulation_threads: 4,
            item_lifetime_secs: 180,
            rng_seed: None,
        }
    }
}

impl WorldConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sleep_grace(&self) -> Duration {
        Duration::from_secs(self.sleep_grace_secs)
    }

    pub fn item_lifetime(&self) -> Option<Duration> {
        (self.item_lifetime_secs > 0).then(|| Duration::from_secs(self.item_lifetime_secs))
    }

    /// The scheduler settings for one instance's life task.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig::every(self.tick_interval())
    }
}
