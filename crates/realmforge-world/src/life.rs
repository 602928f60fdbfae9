//! The per-instance life task.
//!
//! Each instance gets one Tokio task that ticks at a fixed interval and
//! advances the instance's entities. When a tick finds the instance
//! sleeping, the scheduler is paused and the task parks on the instance's
//! wake signal until a session registers (or the instance is closed).
//!
//! [`MapInstance::close`] ends the task. The task upgrades its `Weak`
//! reference only while a tick runs, so an instance that was dropped
//! without being closed ends it too.

use std::sync::{Arc, Weak};

use realmforge_session::Broadcaster;
use realmforge_tick::{TickConfig, TickScheduler};
use tokio::task::JoinHandle;

use crate::MapInstance;

/// Spawns the life task of `instance`.
pub fn spawn_life(
    instance: &Arc<MapInstance>,
    broadcaster: Arc<Broadcaster>,
    pool: Arc<rayon::ThreadPool>,
    tick: TickConfig,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(instance);
    tokio::spawn(run_life(weak, broadcaster, pool, tick))
}

async fn run_life(
    weak: Weak<MapInstance>,
    broadcaster: Arc<Broadcaster>,
    pool: Arc<rayon::ThreadPool>,
    tick: TickConfig,
) {
    let mut scheduler = TickScheduler::new(tick);
    let Some((instance_id, wake)) = weak.upgrade().map(|i| (i.id(), i.wake_signal())) else {
        return;
    };
    tracing::debug!(%instance_id, "life task started");

    loop {
        tokio::select! {
            _ = wake.notified() => {
                let Some(instance) = weak.upgrade() else {
                    break;
                };
                if instance.is_closed() {
                    break;
                }
                if !instance.is_sleeping() {
                    scheduler.resume();
                }
            }
            info = scheduler.wait_for_tick() => {
                let Some(instance) = weak.upgrade() else {
                    break;
                };
                if instance.is_closed() {
                    break;
                }
                if instance.is_sleeping() {
                    scheduler.pause();
                    tracing::debug!(%instance_id, tick = info.tick, "map instance asleep");
                    continue;
                }
                let report = instance.advance(info.tick, &pool, &broadcaster).await;
                scheduler.record_tick_end();
                tracing::trace!(
                    %instance_id,
                    tick = info.tick,
                    moved = report.moved,
                    expired = report.expired,
                    "life tick"
                );
            }
        }
    }

    tracing::debug!(%instance_id, "life task stopped");
}
