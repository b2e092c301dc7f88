//! World command tests.
//!
//! Commands arrive as JSON (the runner's `--command` flag) and are
//! applied through the store.

use anthill_core::{
    command::WorldCommand,
    error::SimError,
    store::StateStore,
    world::{World, ORIGIN_TILE},
};

fn store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("game.json"));
    (dir, store)
}

fn parse(json: &str) -> WorldCommand {
    serde_json::from_str(json).expect("valid command")
}

#[test]
fn add_resource_is_persisted() {
    let (_dir, store) = store();

    parse(r#"{"cmd": "add_resource", "resource": "dirt", "amount": 5}"#)
        .execute(&store)
        .unwrap();
    parse(r#"{"cmd": "add_resource", "resource": "dirt", "amount": 2.5}"#)
        .execute(&store)
        .unwrap();

    let on_disk = StateStore::open(store.path()).load();
    assert_eq!(on_disk.resources.get("dirt"), 7.5);
    assert!(on_disk.last_save_timestamp.is_some());
}

#[test]
fn negative_amount_floors_at_zero() {
    let mut world = World::default();
    world.add_resource("fungus", 3.0);

    parse(r#"{"cmd": "add_resource", "resource": "fungus", "amount": -10}"#)
        .apply_to(&mut world)
        .unwrap();

    assert_eq!(world.resources.get("fungus"), 0.0);
}

#[test]
fn queue_action_records_start_tick() {
    let mut world = World::default();
    world.tick = 42;

    parse(r#"{"cmd": "queue_action", "name": "dig", "duration_ticks": 5, "effects": {"dirt": 10}}"#)
        .apply_to(&mut world)
        .unwrap();

    let action = &world.queues.actions[0];
    assert_eq!(action.name, "dig");
    assert_eq!(action.ticks_remaining, 5);
    assert_eq!(action.started_at_tick, 42);
    assert_eq!(action.effects.resources["dirt"], 10.0);
}

#[test]
fn add_system_keeps_extra_fields() {
    let mut world = World::default();

    parse(
        r#"{"cmd": "add_system", "system_id": "farm",
            "system": {"consumes": {"dirt": 1}, "generates": {"fungus": 0.5}, "label": "Fungus Farm"}}"#,
    )
    .apply_to(&mut world)
    .unwrap();

    let farm = &world.systems["farm"];
    assert_eq!(farm.consumes["dirt"], 1.0);
    assert_eq!(farm.generates["fungus"], 0.5);
    assert_eq!(farm.attributes["label"], "Fungus Farm");
}

#[test]
fn add_tile_connects_and_refuses_duplicates() {
    let mut world = World::default();
    let add = r#"{"cmd": "add_tile", "tile_id": "tunnel",
                  "tile": {"name": "Narrow Tunnel", "type": "tunnel", "x": 1, "y": 0},
                  "connect_to": "origin"}"#;

    parse(add).apply_to(&mut world).unwrap();

    assert_eq!(world.map.tiles["tunnel"].name, "Narrow Tunnel");
    assert!(world.map.connected("tunnel", ORIGIN_TILE));
    assert!(matches!(
        parse(add).apply_to(&mut world),
        Err(SimError::TileExists { ref tile_id }) if tile_id == "tunnel"
    ));
    assert_eq!(world.map.connections.len(), 1);
}

#[test]
fn spawn_entity_uses_defaults_and_overrides() {
    let mut world = World::default();

    parse(r#"{"cmd": "spawn_entity", "type": "ant", "role": "worker", "food": "fungus", "hunger_rate": 0.2}"#)
        .apply_to(&mut world)
        .unwrap();

    let ant = &world.entities[0];
    assert_eq!(ant.kind, "ant");
    assert_eq!(ant.role.as_deref(), Some("worker"));
    assert_eq!(ant.food.as_deref(), Some("fungus"));
    assert_eq!(ant.hunger, 100.0);
    assert_eq!(ant.hunger_rate, 0.2);
    assert_eq!(ant.age, 0);
    assert_eq!(ant.tile, ORIGIN_TILE);
    assert_eq!(ant.id.len(), 8);
}

#[test]
fn failed_command_leaves_file_alone() {
    let (_dir, store) = store();
    let add = r#"{"cmd": "add_tile", "tile_id": "origin", "tile": {"name": "Again"}}"#;

    assert!(parse(add).execute(&store).is_err());
    assert!(!store.exists());
}

#[test]
fn unknown_command_is_rejected() {
    let result = serde_json::from_str::<WorldCommand>(r#"{"cmd": "summon_dragon"}"#);
    assert!(result.is_err());
}
