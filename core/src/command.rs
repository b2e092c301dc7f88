use crate::{
    error::SimResult,
    store::StateStore,
    types::{ResourceDelta, Tick},
    world::{Entity, System, Tile, World},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operator commands against the persisted world.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum WorldCommand {
    QueueAction {
        name:           String,
        duration_ticks: Tick,
        #[serde(default)]
        effects:        ResourceDelta,
        #[serde(default)]
        metadata:       Map<String, Value>,
    },
    AddResource {
        resource: String,
        amount:   f64,
    },
    AddSystem {
        system_id: String,
        system:    System,
    },
    AddTile {
        tile_id:    String,
        tile:       Tile,
        #[serde(default)]
        connect_to: Option<String>,
    },
    SpawnEntity {
        #[serde(rename = "type")]
        kind:        String,
        #[serde(default)]
        role:        Option<String>,
        #[serde(default)]
        tile:        Option<String>,
        #[serde(default)]
        food:        Option<String>,
        #[serde(default)]
        hunger_rate: Option<f64>,
        #[serde(default)]
        max_age:     Option<Tick>,
    },
}

impl WorldCommand {
    /// Apply to an in-memory document.
    pub fn apply_to(self, world: &mut World) -> SimResult<()> {
        match self {
            Self::QueueAction { name, duration_ticks, effects, metadata } => {
                world.queue_action(&name, duration_ticks, effects, metadata);
            }
            Self::AddResource { resource, amount } => {
                world.add_resource(&resource, amount);
            }
            Self::AddSystem { system_id, system } => {
                world.add_system(&system_id, system);
            }
            Self::AddTile { tile_id, tile, connect_to } => {
                world.add_tile(&tile_id, tile, connect_to.as_deref())?;
            }
            Self::SpawnEntity { kind, role, tile, food, hunger_rate, max_age } => {
                let mut entity = Entity::new(&kind);
                entity.role = role;
                entity.food = food;
                if let Some(tile) = tile {
                    entity.tile = tile;
                }
                if let Some(rate) = hunger_rate {
                    entity.hunger_rate = rate;
                }
                if let Some(max_age) = max_age {
                    entity.max_age = max_age;
                }
                world.spawn_entity(entity);
            }
        }
        Ok(())
    }

    /// Load → apply → save through the store. Returns the saved document.
    pub fn execute(self, store: &StateStore) -> SimResult<World> {
        let mut world = store.load();
        log::info!("tick={} command: {self:?}", world.tick);
        self.apply_to(&mut world)?;
        store.save(&mut world)?;
        Ok(world)
    }
}
