//! Exploration: digging opens up new ground.
//!
//! Every `dirt_per_discovery` units of dirt in stock unlock one discovery
//! from a fixed catalogue. The discovery is picked from this extension's
//! RNG stream, appended to the map, connected to the origin, and its
//! resource is initialised. Publishes `tile_discovered`.
//!
//! Progress is read back from the map itself (catalogue tiles already
//! present), so nothing is lost across restarts. A summary is kept in
//! `meta.exploration` for viewers.
//!
//! Listens to: tick.

use crate::{
    bus::{EventBus, HandlerResult, Outbox},
    config::ExplorationConfig,
    event::topic,
    extension::Extension,
    rng::{ExtensionSlot, RngBank},
    store::StateStore,
    types::Tick,
    world::{Tile, World, ORIGIN_TILE},
};
use serde_json::{json, Value};

pub const ID: &str = "exploration";
pub const TILE_DISCOVERED: &str = "tile_discovered";

pub struct Discovery {
    pub id:          &'static str,
    pub name:        &'static str,
    pub kind:        &'static str,
    pub x:           i64,
    pub y:           i64,
    pub resource:    &'static str,
    pub description: &'static str,
}

pub static DISCOVERIES: [Discovery; 5] = [
    Discovery {
        id: "crystal_cave", name: "Crystal Cave", kind: "resource", x: 2, y: 0,
        resource: "crystals", description: "Strange formations glitter in the dark",
    },
    Discovery {
        id: "water_source", name: "Underground Spring", kind: "resource", x: 0, y: -1,
        resource: "water", description: "Clean water seeps from the rock",
    },
    Discovery {
        id: "bone_pit", name: "Ancient Bones", kind: "mystery", x: -2, y: 0,
        resource: "bones", description: "The remains of something large",
    },
    Discovery {
        id: "root_network", name: "Root Network", kind: "organic", x: 0, y: 2,
        resource: "sap", description: "Thick roots from the surface, dripping with sap",
    },
    Discovery {
        id: "ore_vein", name: "Glittering Vein", kind: "resource", x: -1, y: -1,
        resource: "ore", description: "Veins of copper and gold thread through the stone",
    },
];

pub struct ExplorationExtension {
    store:  StateStore,
    config: ExplorationConfig,
    rng:    RngBank,
}

impl ExplorationExtension {
    pub fn new(store: StateStore, config: ExplorationConfig, seed: u64) -> Self {
        Self { store, config, rng: RngBank::new(seed) }
    }
}

impl Extension for ExplorationExtension {
    fn id(&self) -> &'static str { ID }

    fn register(&mut self, bus: &mut EventBus, world: &World) -> anyhow::Result<()> {
        if self.config.dirt_per_discovery <= 0.0 || !self.config.dirt_per_discovery.is_finite() {
            anyhow::bail!(
                "dirt_per_discovery must be positive, got {}",
                self.config.dirt_per_discovery
            );
        }

        let known = DISCOVERIES.iter().filter(|d| world.map.tiles.contains_key(d.id)).count();
        log::info!("exploration: {known}/{} discoveries already claimed", DISCOVERIES.len());

        let store = self.store.clone();
        let config = self.config.clone();
        let rng = self.rng;
        bus.register(topic::TICK, ID, move |payload, outbox| {
            on_tick(&store, &config, rng, payload, outbox)
        });
        Ok(())
    }
}

fn on_tick(
    store:   &StateStore,
    config:  &ExplorationConfig,
    rng:     RngBank,
    payload: &Value,
    outbox:  &mut Outbox,
) -> HandlerResult {
    let dirt = payload["resources"]["dirt"].as_f64().unwrap_or(0.0);
    let allowed = (dirt / config.dirt_per_discovery).floor() as usize;
    let claimed = DISCOVERIES
        .iter()
        .filter(|d| payload["map"]["tiles"].get(d.id).is_some())
        .count();
    if allowed <= claimed {
        return Ok(None);
    }

    let mut world = store.load();
    let available: Vec<&Discovery> = DISCOVERIES
        .iter()
        .filter(|d| !world.map.tiles.contains_key(d.id))
        .collect();
    let tick = world.tick;
    let Some(discovery) = rng.at(ExtensionSlot::Exploration, tick).pick(&available).copied()
    else {
        return Ok(None);
    };

    claim(&mut world, discovery, tick)?;
    store.save(&mut world)?;

    log::info!("tick={tick} exploration: claimed {}", discovery.name);
    outbox.emit(TILE_DISCOVERED, json!({
        "tile_id": discovery.id,
        "name": discovery.name,
        "resource": discovery.resource,
        "tick": tick,
    }));
    Ok(Some(json!({ "discovered": discovery.id })))
}

/// Append the discovery's tile and record it under `meta.exploration`.
pub fn claim(world: &mut World, discovery: &Discovery, tick: Tick) -> anyhow::Result<()> {
    let mut tile = Tile::new(discovery.name, discovery.kind, discovery.x, discovery.y);
    tile.attributes.insert("resource".into(), json!(discovery.resource));
    tile.attributes.insert("description".into(), json!(discovery.description));
    world.add_tile(discovery.id, tile, Some(ORIGIN_TILE))?;
    world.resources.ensure(discovery.resource);

    let record = world
        .meta
        .entry(ID)
        .or_insert_with(|| json!({ "discovered": [] }));
    if !record.is_object() {
        *record = json!({ "discovered": [] });
    }
    if let Some(found) = record["discovered"].as_array_mut() {
        found.push(json!(discovery.id));
    } else {
        record["discovered"] = json!([discovery.id]);
    }
    record["last_discovery_tick"] = json!(tick);
    Ok(())
}
