//! The world document: the single root of all simulation state.
//!
//! RULE: The tick engine owns the live document between transitions.
//! Extensions never hold a `World` across ticks; they go through the
//! state store (load → mutate → save).
//!
//! Anything that must survive a restart lives here, never in a
//! process-global. Keys under `meta` belong to extensions and the core
//! never reads or writes them.

use crate::{
    error::{SimError, SimResult},
    event::WorldEvent,
    types::{EntityId, ResourceDelta, Tick},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const ORIGIN_TILE: &str = "origin";

pub const DEFAULT_HUNGER: f64 = 100.0;
pub const DEFAULT_HUNGER_RATE: f64 = 0.1;
pub const DEFAULT_MAX_AGE: Tick = 3600;

// ── Resources ──────────────────────────────────────────────────────

/// Resource balances. Quantities never go below zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(BTreeMap<String, f64>);

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance; absent resources read as zero.
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn amounts(&self) -> &BTreeMap<String, f64> {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    /// True when every entry of `cost` is a valid rate and fully covered.
    pub fn can_afford(&self, cost: &ResourceDelta) -> bool {
        cost.iter()
            .all(|(name, amount)| is_valid_rate(*amount) && self.get(name) >= *amount)
    }

    /// All-or-nothing debit. Returns false and changes nothing when
    /// any single entry is unaffordable.
    pub fn debit(&mut self, cost: &ResourceDelta) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        for (name, amount) in cost {
            let balance = self.0.entry(name.clone()).or_insert(0.0);
            *balance = (*balance - amount).max(0.0);
        }
        true
    }

    /// Add `amount` (may be negative). The balance floors at zero.
    pub fn credit(&mut self, name: &str, amount: f64) {
        if !amount.is_finite() {
            return;
        }
        let balance = self.0.entry(name.to_string()).or_insert(0.0);
        *balance = (*balance + amount).max(0.0);
    }

    /// Ensure the resource exists without changing an existing balance.
    pub fn ensure(&mut self, name: &str) {
        self.0.entry(name.to_string()).or_insert(0.0);
    }

    /// Zero every negative or non-finite balance. Returns the names fixed.
    fn repair(&mut self) -> Vec<String> {
        let mut fixed = Vec::new();
        for (name, amount) in self.0.iter_mut() {
            if !amount.is_finite() || *amount < 0.0 {
                *amount = 0.0;
                fixed.push(name.clone());
            }
        }
        fixed
    }

    fn validate(&self) -> SimResult<()> {
        for (name, amount) in &self.0 {
            if !amount.is_finite() || *amount < 0.0 {
                return Err(SimError::InvalidWorld {
                    reason: format!("resource '{name}' has quantity {amount}"),
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, f64)> for Resources {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn is_valid_rate(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}

// ── Systems ────────────────────────────────────────────────────────

/// A resource converter evaluated once per transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct System {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub consumes: ResourceDelta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub generates: ResourceDelta,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl System {
    pub fn new(consumes: ResourceDelta, generates: ResourceDelta) -> Self {
        Self { consumes, generates, attributes: Map::new() }
    }

    /// A system with a negative or non-finite rate never runs.
    pub fn is_well_formed(&self) -> bool {
        self.consumes.values().chain(self.generates.values()).all(|r| is_valid_rate(*r))
    }
}

// ── Entities ───────────────────────────────────────────────────────

/// A mortal actor. Unknown fields are kept in `attributes` so
/// extensions can tag entities without touching the core schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default = "default_tile")]
    pub tile: String,
    #[serde(default)]
    pub age: Tick,
    #[serde(default = "default_hunger")]
    pub hunger: f64,
    #[serde(default = "default_hunger_rate")]
    pub hunger_rate: f64,
    #[serde(default = "default_max_age")]
    pub max_age: Tick,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

fn default_kind() -> String { "unknown".into() }
fn default_tile() -> String { ORIGIN_TILE.into() }
fn default_hunger() -> f64 { DEFAULT_HUNGER }
fn default_hunger_rate() -> f64 { DEFAULT_HUNGER_RATE }
fn default_max_age() -> Tick { DEFAULT_MAX_AGE }

impl Entity {
    /// A fresh, fully fed entity at the origin with a short random id.
    pub fn new(kind: &str) -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self::with_id(id, kind)
    }

    pub fn with_id(id: impl Into<EntityId>, kind: &str) -> Self {
        Self {
            id: id.into(),
            kind: kind.to_string(),
            role: None,
            tile: default_tile(),
            age: 0,
            hunger: DEFAULT_HUNGER,
            hunger_rate: DEFAULT_HUNGER_RATE,
            max_age: DEFAULT_MAX_AGE,
            food: None,
            attributes: Map::new(),
        }
    }

    pub fn role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn food(mut self, food: &str) -> Self {
        self.food = Some(food.to_string());
        self
    }

    pub fn tile(mut self, tile: &str) -> Self {
        self.tile = tile.to_string();
        self
    }

    pub fn hunger(mut self, hunger: f64) -> Self {
        self.hunger = hunger;
        self
    }

    pub fn hunger_rate(mut self, rate: f64) -> Self {
        self.hunger_rate = rate;
        self
    }

    pub fn max_age(mut self, max_age: Tick) -> Self {
        self.max_age = max_age;
        self
    }
}

// ── Queues ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionEffects {
    #[serde(default)]
    pub resources: ResourceDelta,
}

/// A timed effect. Applied once when `ticks_remaining` runs out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub ticks_remaining: Tick,
    #[serde(default)]
    pub started_at_tick: Tick,
    #[serde(default)]
    pub effects: ActionEffects,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Queues {
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Pending notifications owned by extensions. The core only checks
    /// whether the list is empty.
    #[serde(default)]
    pub events: Vec<Value>,
}

impl Queues {
    pub fn is_idle(&self) -> bool {
        self.actions.is_empty() && self.events.is_empty()
    }
}

// ── Map ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Tile {
    pub fn new(name: &str, kind: &str, x: i64, y: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            x,
            y,
            attributes: Map::new(),
        }
    }
}

/// Tiles plus undirected connections. Grows only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMap {
    #[serde(default)]
    pub tiles: BTreeMap<String, Tile>,
    #[serde(default)]
    pub connections: Vec<[String; 2]>,
}

impl Default for WorldMap {
    fn default() -> Self {
        let mut tiles = BTreeMap::new();
        tiles.insert(ORIGIN_TILE.to_string(), Tile::new("The Starting Dirt", "empty", 0, 0));
        Self { tiles, connections: Vec::new() }
    }
}

impl WorldMap {
    /// Whether `a` and `b` are joined, in either direction.
    pub fn connected(&self, a: &str, b: &str) -> bool {
        self.connections
            .iter()
            .any(|[x, y]| (x == a && y == b) || (x == b && y == a))
    }
}

// ── World ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    #[serde(default)]
    pub tick: Tick,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub systems: BTreeMap<String, System>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub map: WorldMap,
    #[serde(default)]
    pub queues: Queues,
    #[serde(default)]
    pub meta: Map<String, Value>,
    /// Consecutive idle transitions, see `detect::boredom`.
    #[serde(default)]
    pub boredom: u64,
    #[serde(
        default,
        with = "crate::serde_unix_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_save_timestamp: Option<DateTime<Utc>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject documents the transition function must never see.
    pub fn validate(&self) -> SimResult<()> {
        self.resources.validate()?;
        for entity in &self.entities {
            if !entity.hunger.is_finite() || !entity.hunger_rate.is_finite() {
                return Err(SimError::InvalidWorld {
                    reason: format!("entity '{}' has non-finite hunger", entity.id),
                });
            }
        }
        Ok(())
    }

    /// Bring a document read from disk back within what `validate`
    /// accepts. Returns one line per repaired field; empty when the
    /// document was already valid.
    pub fn repair(&mut self) -> Vec<String> {
        let mut fixed: Vec<String> = self
            .resources
            .repair()
            .into_iter()
            .map(|name| format!("resource '{name}' reset to 0"))
            .collect();
        for entity in &mut self.entities {
            if !entity.hunger.is_finite() {
                entity.hunger = DEFAULT_HUNGER;
                fixed.push(format!("entity '{}' hunger reset to {DEFAULT_HUNGER}", entity.id));
            }
            if !entity.hunger_rate.is_finite() {
                entity.hunger_rate = DEFAULT_HUNGER_RATE;
                fixed.push(format!(
                    "entity '{}' hunger_rate reset to {DEFAULT_HUNGER_RATE}",
                    entity.id
                ));
            }
        }
        fixed
    }

    pub fn queue_action(
        &mut self,
        name: &str,
        duration_ticks: Tick,
        effects: ResourceDelta,
        metadata: Map<String, Value>,
    ) -> &Action {
        self.queues.actions.push(Action {
            name: name.to_string(),
            ticks_remaining: duration_ticks,
            started_at_tick: self.tick,
            effects: ActionEffects { resources: effects },
            metadata,
        });
        log::debug!("tick={} queued action {name} ({duration_ticks} ticks)", self.tick);
        &self.queues.actions[self.queues.actions.len() - 1]
    }

    pub fn add_resource(&mut self, resource: &str, amount: f64) {
        self.resources.credit(resource, amount);
    }

    pub fn add_system(&mut self, system_id: &str, system: System) {
        self.systems.insert(system_id.to_string(), system);
    }

    /// Append a tile, optionally connecting it to an existing one.
    /// Existing tiles are never replaced.
    pub fn add_tile(&mut self, tile_id: &str, tile: Tile, connect_to: Option<&str>) -> SimResult<()> {
        if self.map.tiles.contains_key(tile_id) {
            return Err(SimError::TileExists { tile_id: tile_id.to_string() });
        }
        self.map.tiles.insert(tile_id.to_string(), tile);
        if let Some(other) = connect_to {
            self.map.connections.push([other.to_string(), tile_id.to_string()]);
        }
        Ok(())
    }

    pub fn spawn_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id.clone();
        log::debug!("tick={} spawned {} {id} at {}", self.tick, entity.kind, entity.tile);
        self.entities.push(entity);
        id
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn count_entities(&self, kind: &str) -> usize {
        self.entities.iter().filter(|e| e.kind == kind).count()
    }

    /// Remove an entity for an extension-defined cause (hazards, culls).
    /// Returns the single death notification, or None if no such entity.
    pub fn remove_entity(&mut self, id: &str, cause: &str) -> Option<WorldEvent> {
        let index = self.entities.iter().position(|e| e.id == id)?;
        let entity = self.entities.remove(index);
        Some(WorldEvent::EntityDied {
            entity,
            cause: cause.to_string(),
            tick: self.tick,
        })
    }
}
