//! Graveyard: keeps a record of the dead.
//!
//! Every `entity_died` is written to `meta.graveyard` as a corpse record
//! (id, type, tick, cause, tile) plus a running total per cause. Only the
//! newest `max_corpses` records are kept; totals are never trimmed.
//!
//! Listens to: entity_died.

use crate::{
    bus::{EventBus, HandlerResult},
    config::GraveyardConfig,
    event::topic,
    extension::Extension,
    store::StateStore,
    world::World,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ID: &str = "graveyard";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corpse {
    pub entity_id:   String,
    pub entity_type: String,
    pub death_tick:  u64,
    pub cause:       String,
    pub tile:        String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraveyardRecord {
    #[serde(default)]
    pub corpses: Vec<Corpse>,
    #[serde(default)]
    pub total_processed: u64,
    #[serde(default)]
    pub by_cause: Map<String, Value>,
}

impl GraveyardRecord {
    /// Read the record out of a document; absent or malformed reads as empty.
    pub fn of(world: &World) -> Self {
        world
            .meta
            .get(ID)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn bury(&mut self, corpse: Corpse, max_corpses: usize) {
        let count = self.by_cause.get(&corpse.cause).and_then(Value::as_u64).unwrap_or(0);
        self.by_cause.insert(corpse.cause.clone(), Value::from(count + 1));
        self.total_processed += 1;
        self.corpses.push(corpse);
        if self.corpses.len() > max_corpses {
            let excess = self.corpses.len() - max_corpses;
            self.corpses.drain(..excess);
        }
    }
}

pub struct GraveyardExtension {
    store:  StateStore,
    config: GraveyardConfig,
}

impl GraveyardExtension {
    pub fn new(store: StateStore, config: GraveyardConfig) -> Self {
        Self { store, config }
    }
}

impl Extension for GraveyardExtension {
    fn id(&self) -> &'static str { ID }

    fn register(&mut self, bus: &mut EventBus, _world: &World) -> anyhow::Result<()> {
        let store = self.store.clone();
        let max_corpses = self.config.max_corpses;
        bus.register(topic::ENTITY_DIED, ID, move |payload, _outbox| {
            on_entity_died(&store, max_corpses, payload)
        });
        Ok(())
    }
}

fn on_entity_died(store: &StateStore, max_corpses: usize, payload: &Value) -> HandlerResult {
    let entity = &payload["entity"];
    let Some(entity_id) = entity["id"].as_str() else {
        anyhow::bail!("entity_died payload has no entity id");
    };
    let corpse = Corpse {
        entity_id:   entity_id.to_string(),
        entity_type: entity["type"].as_str().unwrap_or("unknown").to_string(),
        death_tick:  payload["tick"].as_u64().unwrap_or(0),
        cause:       payload["cause"].as_str().unwrap_or("unknown").to_string(),
        tile:        entity["tile"].as_str().unwrap_or("origin").to_string(),
    };

    let mut world = store.load();
    let mut record = GraveyardRecord::of(&world);
    log::debug!(
        "tick={} graveyard: {} {} died of {}",
        corpse.death_tick, corpse.entity_type, corpse.entity_id, corpse.cause
    );
    record.bury(corpse, max_corpses);
    world.meta.insert(ID.to_string(), serde_json::to_value(&record)?);
    store.save(&mut world)?;
    Ok(None)
}
