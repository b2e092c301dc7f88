//! Runtime loop tests.
//!
//! Tests cover: publish order, failure isolation in the live loop,
//! pacing, persistence cadence, adoption of extension writes, startup
//! catch-up, and the advance / fast-forward helpers.

use anthill_core::{
    clock::{Clock, ManualClock},
    config::{GraveyardConfig, SimConfig},
    engine::SimEngine,
    event::{topic, WorldEvent},
    graveyard_extension::{GraveyardExtension, GraveyardRecord},
    store::StateStore,
    world::{Entity, World},
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// An engine over `world`, saved at `epoch()`, with a manual clock
/// standing at the same instant.
fn build(dir: &TempDir, mut world: World, config: SimConfig) -> (SimEngine, ManualClock) {
    let store = StateStore::open(dir.path().join("game.json"));
    store.save_at(&mut world, epoch()).expect("seed state");
    let clock = ManualClock::at(epoch());
    let config = config.with_state_path(store.path());
    let engine = SimEngine::new(config, store, Box::new(clock.clone()));
    (engine, clock)
}

fn record_topics(engine: &mut SimEngine, topics: &[&'static str]) -> Rc<RefCell<Vec<String>>> {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    for &name in topics {
        let log = Rc::clone(&log);
        engine.bus_mut().register(name, "recorder", move |_payload, _outbox| {
            log.borrow_mut().push(name.to_string());
            Ok(None)
        });
    }
    log
}

#[test]
fn one_step_publishes_transition_events_then_tick_then_detectors() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = World::default();
    world.queue_action("dig", 1, [("dirt".to_string(), 10.0)].into(), Map::new());
    let (mut engine, _clock) = build(&dir, world, SimConfig::default_test());
    let log = record_topics(&mut engine, &[topic::THRESHOLD, topic::TICK, topic::ACTION_COMPLETE]);

    let produced = engine.step().unwrap();

    assert_eq!(*log.borrow(), vec!["action_complete", "tick", "threshold"]);
    let topics: Vec<&str> = produced.iter().map(|e| e.topic()).collect();
    assert_eq!(topics, vec!["action_complete", "threshold"]);
    assert_eq!(engine.world().tick, 1);
    assert_eq!(engine.world().resources.get("dirt"), 10.0);
}

#[test]
fn tick_payload_is_the_new_document() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _clock) = build(&dir, World::default(), SimConfig::default_test());
    let seen: Rc<RefCell<Vec<u64>>> = Rc::default();
    {
        let seen = Rc::clone(&seen);
        engine.bus_mut().register(topic::TICK, "watcher", move |payload, _outbox| {
            seen.borrow_mut().push(payload["tick"].as_u64().unwrap_or(0));
            Ok(None)
        });
    }

    engine.advance(3).unwrap();

    assert_eq!(*seen.borrow(), vec![1, 2, 3]);
}

#[test]
fn broken_handlers_do_not_stop_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _clock) = build(&dir, World::default(), SimConfig::default_test());
    engine.bus_mut().register(topic::TICK, "erroring", |_p, _o| anyhow::bail!("boom"));
    engine.bus_mut().register(topic::TICK, "panicking", |_p, _o| panic!("kaboom"));
    let log = record_topics(&mut engine, &[topic::TICK]);

    engine.run_for(5);

    assert_eq!(engine.world().tick, 5);
    assert_eq!(log.borrow().len(), 5);
    assert_eq!(engine.failed_ticks(), 0);
}

#[test]
fn each_cycle_sleeps_out_the_rest_of_its_budget() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig { tick_interval_ms: 1000, ..SimConfig::default_test() };
    let (mut engine, clock) = build(&dir, World::default(), config);
    {
        let clock = clock.clone();
        engine.bus_mut().register(topic::TICK, "slow", move |_p, _o| {
            clock.advance(Duration::from_millis(300));
            Ok(None)
        });
    }

    engine.run_for(3);

    assert_eq!(clock.sleeps(), vec![Duration::from_millis(700); 3]);
}

#[test]
fn overrunning_cycle_does_not_sleep() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig { tick_interval_ms: 1000, ..SimConfig::default_test() };
    let (mut engine, clock) = build(&dir, World::default(), config);
    {
        let clock = clock.clone();
        engine.bus_mut().register(topic::TICK, "glacial", move |_p, _o| {
            clock.advance(Duration::from_millis(2500));
            Ok(None)
        });
    }

    engine.run_for(2);

    assert_eq!(clock.sleeps(), vec![Duration::ZERO; 2]);
    assert_eq!(engine.world().tick, 2);
}

#[test]
fn out_of_range_document_on_disk_still_advances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game.json");
    let saved_at = epoch().timestamp();
    fs::write(
        &path,
        format!(
            r#"{{"tick": 40, "resources": {{"dirt": -1.0, "fungus": 5}},
                "systems": {{"farm": {{"generates": {{"fungus": 1}}}}}},
                "last_save_timestamp": {saved_at}}}"#
        ),
    )
    .unwrap();
    let clock = ManualClock::at(epoch() + chrono::Duration::hours(1));
    let config = SimConfig::default_test().with_state_path(&path);
    let mut engine = SimEngine::new(config, StateStore::open(&path), Box::new(clock));

    let report = engine.start();
    engine.run_for(100);

    assert_eq!(report.applied, 3600);
    assert_eq!(engine.failed_ticks(), 0);
    let world = engine.world();
    assert_eq!(world.tick, 40 + 3600 + 100);
    assert_eq!(world.resources.get("dirt"), 0.0);
    assert_eq!(world.resources.get("fungus"), 5.0 + 3600.0 + 100.0);
    assert_eq!(engine.store().read_persisted().unwrap().tick, 3740);
}

#[test]
fn state_is_persisted_every_nth_tick() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig { save_every: 5, ..SimConfig::default_test() };
    let (mut engine, _clock) = build(&dir, World::default(), config);

    for _ in 0..4 {
        engine.step().unwrap();
    }
    assert_eq!(engine.store().read_persisted().unwrap().tick, 0);

    engine.step().unwrap();
    assert_eq!(engine.store().read_persisted().unwrap().tick, 5);

    engine.step().unwrap();
    assert_eq!(engine.store().read_persisted().unwrap().tick, 5);
    assert_eq!(engine.store().load().tick, 6, "live copy runs ahead of the file");
}

#[test]
fn extension_writes_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _clock) = build(&dir, World::default(), SimConfig::default_test());
    let store = engine.store().clone();
    engine.bus_mut().register(topic::TICK, "crumbs", move |_payload, _outbox| {
        let mut world = store.load();
        world.add_resource("crumbs", 1.0);
        world.meta.insert("crumbs".into(), Value::from(world.tick));
        store.save(&mut world)?;
        Ok(None)
    });

    engine.advance(3).unwrap();

    assert_eq!(engine.world().tick, 3);
    assert_eq!(engine.world().resources.get("crumbs"), 3.0);
    assert_eq!(engine.world().meta["crumbs"], 3);
    let on_disk = engine.store().read_persisted().unwrap();
    assert_eq!(on_disk.resources.get("crumbs"), 3.0);
}

#[test]
fn boredom_is_published_after_tick() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig { boredom_threshold: 2, ..SimConfig::default_test() };
    let (mut engine, _clock) = build(&dir, World::default(), config);
    let log = record_topics(&mut engine, &[topic::BOREDOM, topic::TICK]);

    engine.step().unwrap();
    let produced = engine.step().unwrap();

    assert_eq!(*log.borrow(), vec!["tick", "tick", "boredom"]);
    assert_eq!(produced, vec![WorldEvent::Boredom { level: 2, tick: 2 }]);
    assert_eq!(engine.world().boredom, 0);
}

#[test]
fn startup_replays_downtime_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = World::default();
    world.tick = 10;
    let (mut engine, clock) = build(&dir, world, SimConfig::default_test());
    clock.advance(Duration::from_secs(120));

    let report = engine.start();

    assert_eq!(report.applied, 120);
    assert_eq!(engine.world().tick, 130);
    let on_disk = engine.store().read_persisted().unwrap();
    assert_eq!(on_disk.tick, 130);
    assert_eq!(on_disk.last_save_timestamp, Some(clock.now()));
}

#[test]
fn startup_without_previous_state_still_persists() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("fresh.json"));
    let clock = ManualClock::at(epoch());
    let mut engine = SimEngine::new(SimConfig::default_test(), store, Box::new(clock));

    let report = engine.start();

    assert_eq!(report.applied, 0);
    assert!(engine.store().exists());
    assert_eq!(engine.store().read_persisted().unwrap().last_save_timestamp, Some(epoch()));
}

#[test]
fn catch_up_deaths_are_not_published() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = World::default();
    world.spawn_entity(Entity::with_id("old-timer", "ant").max_age(20).hunger_rate(0.0));
    let (mut engine, clock) = build(&dir, world, SimConfig::default_test());
    let store = engine.store().clone();
    engine
        .add_extension(Box::new(GraveyardExtension::new(store, GraveyardConfig::default())))
        .unwrap();
    let log = record_topics(&mut engine, &[topic::ENTITY_DIED]);
    clock.advance(Duration::from_secs(60));

    let report = engine.start();

    assert_eq!(report.lost_entities, 1);
    assert!(engine.world().entities.is_empty());
    assert!(log.borrow().is_empty());
    assert_eq!(GraveyardRecord::of(engine.world()).total_processed, 0);
}

#[test]
fn advance_dispatches_and_saves_once_at_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig { save_every: 1000, ..SimConfig::default_test() };
    let (mut engine, _clock) = build(&dir, World::default(), config);
    let log = record_topics(&mut engine, &[topic::TICK]);

    engine.advance(25).unwrap();

    assert_eq!(log.borrow().len(), 25);
    assert_eq!(engine.store().read_persisted().unwrap().tick, 25);
}

#[test]
fn fast_forward_skips_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = World::default();
    world.queue_action("dig", 3, [("dirt".to_string(), 50.0)].into(), Map::new());
    let (mut engine, _clock) = build(&dir, world, SimConfig::default_test());
    let log = record_topics(&mut engine, &[topic::TICK, topic::ACTION_COMPLETE, topic::THRESHOLD]);

    engine.fast_forward(100).unwrap();

    assert!(log.borrow().is_empty());
    assert_eq!(engine.world().tick, 100);
    assert_eq!(engine.world().resources.get("dirt"), 50.0);
    assert_eq!(engine.store().read_persisted().unwrap().tick, 100);
}

#[test]
fn status_summarises_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut world = World::default();
    world.add_resource("dirt", 3.0);
    world.queue_action("dig", 4, Default::default(), Map::new());
    world.spawn_entity(Entity::with_id("ant-1", "ant"));
    let (engine, _clock) = build(&dir, world, SimConfig::default_test());

    let status = engine.status();

    assert_eq!(status.tick, 0);
    assert_eq!(status.resources["dirt"], 3.0);
    assert_eq!(status.actions, vec!["dig (4t)"]);
    assert_eq!(status.tiles, vec!["origin"]);
    assert_eq!(status.entities, 1);
    assert!(status.to_string().contains("dirt=3.00"));
}
