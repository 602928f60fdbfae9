//! Integration tests for map instances, drops and the idle scheduler.
//!
//! Timing tests use `start_paused = true`: `tokio::time::sleep` advances
//! virtual time and lets the life tasks run in between.

use std::sync::Arc;
use std::time::Duration;

use realmforge_protocol::{AccountId, PocketType, VisualId};
use realmforge_session::{
    Broadcaster, Character, CharacterRecord, ItemInstance, Session, SessionId,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use realmforge_world::{
    DropRejection, GameData, InstanceType, Map, MapInstance, PickupRejection, World, WorldConfig,
    WorldError, spawn_life,
};

// =========================================================================
// Helpers
// =========================================================================

const GAME_DATA: &str = r#"{
    "maps": [
        { "id": 1, "name": "village", "width": 30, "height": 30,
          "spawns": [
              { "kind": "monster", "vnum": 24, "x": 10, "y": 10 },
              { "kind": "monster", "vnum": 24, "x": 20, "y": 20 },
              { "kind": "npc", "vnum": 300, "x": 5, "y": 5 }
          ],
          "portals": [{ "x": 29, "y": 29, "destination_map": 2,
                        "destination_x": 2, "destination_y": 2 }] },
        { "id": 2, "name": "walled", "width": 5, "height": 5,
          "blocked": [{ "x": 0, "y": 0, "width": 5, "height": 5 }] }
    ],
    "npc_monsters": [
        { "vnum": 24, "name": "slime", "max_hp": 50, "speed": 8,
          "move_interval_ticks": 1 },
        { "vnum": 300, "name": "merchant", "max_hp": 1000 }
    ]
}"#;

const STACK_SLOT: i16 = 0;

fn config() -> WorldConfig {
    WorldConfig {
        simulation_threads: 2,
        rng_seed: Some(7),
        ..WorldConfig::default()
    }
}

fn world() -> World {
    let data = GameData::from_json(GAME_DATA).unwrap();
    World::start(data, config(), Arc::new(Broadcaster::new())).unwrap()
}

/// A character standing at `(x, y)` of `instance` with 10 items in
/// main pocket slot 0.
fn character_in(instance: &MapInstance, x: i16, y: i16) -> Character {
    let mut record = CharacterRecord::new(VisualId(1), AccountId(1), "hero");
    let mut stack = ItemInstance::new(1012, 10, PocketType::Main);
    stack.slot = STACK_SLOT;
    record.items.push(stack);
    let character = Character::from_record(record);
    character.enter_map(instance.map().id, instance.id(), x, y);
    character
}

fn stack_amount(character: &Character) -> Option<i16> {
    character
        .inventory()
        .get(PocketType::Main, STACK_SLOT)
        .map(|i| i.amount)
}

// =========================================================================
// put_item
// =========================================================================

#[tokio::test]
async fn test_put_item_rejects_out_of_range_amounts() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);

    for amount in [0, -1, 11, i16::MAX] {
        assert_eq!(
            instance
                .put_item(amount, PocketType::Main, STACK_SLOT, &hero)
                .unwrap_err(),
            DropRejection::InvalidAmount,
            "amount {amount}"
        );
    }
    assert_eq!(stack_amount(&hero), Some(10));
    assert!(instance.items().is_empty());
}

#[tokio::test]
async fn test_put_item_decrements_stack_by_amount() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);

    let dropped = instance
        .put_item(3, PocketType::Main, STACK_SLOT, &hero)
        .unwrap();
    assert_eq!(dropped.item.amount, 3);
    assert_eq!(dropped.item.vnum, 1012);
    assert_eq!(dropped.owner, VisualId(1));
    assert!((dropped.x - 15).abs() <= 2 && (dropped.y - 15).abs() <= 2);
    assert_eq!(stack_amount(&hero), Some(7));
    assert!(instance.item(dropped.visual_id).is_some());
}

#[tokio::test]
async fn test_put_item_whole_stack_removes_it() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);

    instance
        .put_item(10, PocketType::Main, STACK_SLOT, &hero)
        .unwrap();
    assert_eq!(stack_amount(&hero), None);
    assert_eq!(
        instance
            .put_item(1, PocketType::Main, STACK_SLOT, &hero)
            .unwrap_err(),
        DropRejection::ItemNotFound
    );
}

#[tokio::test]
async fn test_put_item_without_free_cell_is_rejected() {
    let world = world();
    let instance = world.base_instance(2).unwrap();
    let hero = character_in(&instance, 2, 2);

    assert_eq!(
        instance
            .put_item(1, PocketType::Main, STACK_SLOT, &hero)
            .unwrap_err(),
        DropRejection::NoFreeCell
    );
    assert_eq!(stack_amount(&hero), Some(10));
}

#[tokio::test]
async fn test_put_item_cells_are_not_raster_ordered() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);

    let cells: std::collections::HashSet<_> = (0..10)
        .map(|_| {
            let item = instance
                .put_item(1, PocketType::Main, STACK_SLOT, &hero)
                .unwrap();
            (item.x, item.y)
        })
        .collect();
    assert!(cells.len() > 1, "drops should spread over several cells");
}

#[tokio::test]
async fn test_put_item_ids_are_unique() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);

    let mut ids: Vec<VisualId> = instance.monsters().iter().map(|m| m.visual_id).collect();
    ids.extend(instance.npcs().iter().map(|n| n.visual_id));
    ids.extend(instance.portals().iter().map(|p| VisualId(p.id)));
    for _ in 0..5 {
        ids.push(
            instance
                .put_item(1, PocketType::Main, STACK_SLOT, &hero)
                .unwrap()
                .visual_id,
        );
    }
    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
}

// =========================================================================
// take_item
// =========================================================================

#[tokio::test]
async fn test_take_item_moves_item_into_inventory() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);
    let dropped = instance
        .put_item(4, PocketType::Main, STACK_SLOT, &hero)
        .unwrap();

    let taken = instance.take_item(dropped.visual_id, &hero).unwrap();
    assert_eq!(taken.visual_id, dropped.visual_id);
    assert_eq!(stack_amount(&hero), Some(10), "stacked back onto the source");
    assert_eq!(
        instance.take_item(dropped.visual_id, &hero).unwrap_err(),
        PickupRejection::NotFound
    );
}

#[tokio::test]
async fn test_take_item_too_far() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);
    let dropped = instance
        .put_item(4, PocketType::Main, STACK_SLOT, &hero)
        .unwrap();

    hero.move_to(25, 25);
    assert_eq!(
        instance.take_item(dropped.visual_id, &hero).unwrap_err(),
        PickupRejection::TooFar
    );
    assert!(instance.item(dropped.visual_id).is_some());
}

// =========================================================================
// Presence and entity packets
// =========================================================================

#[tokio::test]
async fn test_send_entities_lists_everything() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);
    instance
        .put_item(2, PocketType::Main, STACK_SLOT, &hero)
        .unwrap();

    let (session, mut rx) = Session::new(SessionId::next());
    instance.send_entities(&session);

    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    let count = |kw: &str| lines.iter().filter(|l| l.starts_with(kw)).count();
    assert_eq!(count("gp "), 1);
    assert_eq!(count("in 3 "), 2);
    assert_eq!(count("in 2 "), 1);
    assert_eq!(count("drop "), 1);
}

#[tokio::test]
async fn test_portal_near() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    assert_eq!(instance.portal_near(28, 28).unwrap().destination_map, 2);
    assert!(instance.portal_near(27, 27).is_none());
}

// =========================================================================
// World
// =========================================================================

#[tokio::test]
async fn test_world_creates_base_instances() {
    let world = world();
    assert_eq!(world.instance_count(), 2);
    let base = world.base_instance(1).unwrap();
    assert_eq!(base.instance_type(), InstanceType::Base);
    assert!(matches!(
        world.base_instance(9),
        Err(WorldError::MapNotFound(9))
    ));
}

#[tokio::test]
async fn test_world_create_and_remove_instance() {
    let world = world();
    let extra = world.create_instance(1).unwrap();
    assert_eq!(extra.instance_type(), InstanceType::Instanced);
    assert_eq!(world.instance_count(), 3);

    world.remove_instance(extra.id()).unwrap();
    assert!(extra.is_closed());
    assert!(world.instance(extra.id()).is_none());
    assert!(matches!(
        world.remove_instance(extra.id()),
        Err(WorldError::InstanceNotFound(_))
    ));

    let base = world.base_instance(1).unwrap();
    assert!(matches!(
        world.remove_instance(base.id()),
        Err(WorldError::BaseInstance(_))
    ));
}

// =========================================================================
// Idle scheduler
// =========================================================================

const GRACE: Duration = Duration::from_secs(30);

#[tokio::test(start_paused = true)]
async fn test_instance_keeps_ticking_within_grace() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let session = SessionId::next();
    instance.register_session(session);
    instance.unregister_session(session);

    tokio::time::sleep(Duration::from_secs(20)).await;
    let before = instance.life_ticks();
    assert!(before > 0);
    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(instance.life_ticks() > before);
    assert!(!instance.is_sleeping());
}

#[tokio::test(start_paused = true)]
async fn test_instance_sleeps_after_grace() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let session = SessionId::next();
    instance.register_session(session);
    instance.unregister_session(session);

    tokio::time::sleep(GRACE + Duration::from_secs(1)).await;
    assert!(instance.is_sleeping());
    let frozen = instance.life_ticks();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(instance.life_ticks(), frozen, "a sleeping instance must not tick");
}

#[tokio::test(start_paused = true)]
async fn test_registration_before_grace_cancels_sleep() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let session = SessionId::next();
    instance.register_session(session);
    instance.unregister_session(session);

    tokio::time::sleep(Duration::from_secs(20)).await;
    instance.register_session(session);
    instance.unregister_session(session);

    // 40s since the first unregister, 20s since the latest one.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(!instance.is_sleeping());
    let before = instance.life_ticks();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(instance.life_ticks() > before);
}

#[tokio::test(start_paused = true)]
async fn test_registration_wakes_sleeping_instance() {
    let world = world();
    let instance = world.base_instance(1).unwrap();

    // Nobody ever came: the instance sleeps one grace period after startup.
    tokio::time::sleep(GRACE + Duration::from_secs(1)).await;
    assert!(instance.is_sleeping());
    let frozen = instance.life_ticks();

    instance.register_session(SessionId::next());
    assert!(!instance.is_sleeping());
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(instance.life_ticks() > frozen);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_items_expire() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    let hero = character_in(&instance, 15, 15);
    instance.register_session(SessionId::next());

    let dropped = instance
        .put_item(1, PocketType::Main, STACK_SLOT, &hero)
        .unwrap();
    tokio::time::sleep(Duration::from_secs(179)).await;
    assert!(instance.item(dropped.visual_id).is_some());
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(instance.item(dropped.visual_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_life_tasks() {
    let world = world();
    let instance = world.base_instance(1).unwrap();
    instance.register_session(SessionId::next());
    tokio::time::sleep(Duration::from_secs(1)).await;

    world.shutdown();
    assert!(instance.is_closed());
    let frozen = instance.life_ticks();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(instance.life_ticks(), frozen);
}

#[tokio::test(start_paused = true)]
async fn test_life_task_ends_when_sleeping_instance_is_dropped() {
    let data = GameData::from_json(GAME_DATA).unwrap();
    let map_data = data.map(1).unwrap();
    let instance = Arc::new(MapInstance::new(
        Arc::new(Map::from_data(map_data)),
        map_data,
        &data,
        InstanceType::Instanced,
        config().sleep_grace(),
        config().item_lifetime(),
        StdRng::seed_from_u64(1),
    ));
    let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap());
    let task = spawn_life(&instance, Arc::new(Broadcaster::new()), pool, config().tick_config());

    tokio::time::sleep(GRACE + Duration::from_secs(1)).await;
    assert!(instance.is_sleeping());
    assert!(instance.life_ticks() > 0);

    // The parked task holds no strong reference, so this is the last one.
    assert_eq!(Arc::strong_count(&instance), 1);
    drop(instance);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("life task still running")
        .unwrap();
}
