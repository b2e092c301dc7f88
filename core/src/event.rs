//! Domain events produced by a transition.
//!
//! RULE: The transition function only *returns* events. Publishing them
//! on the bus is the runtime's job, after the transition has finished.

use crate::{
    error::SimResult,
    types::Tick,
    world::{Action, Entity, World},
};
use serde_json::{json, Value};

/// Topic names the core publishes on. Extensions may use any other name.
pub mod topic {
    pub const TICK: &str = "tick";
    pub const ACTION_COMPLETE: &str = "action_complete";
    pub const ENTITY_ATE: &str = "entity_ate";
    pub const ENTITY_DIED: &str = "entity_died";
    pub const THRESHOLD: &str = "threshold";
    pub const BOREDOM: &str = "boredom";
}

pub const CAUSE_STARVATION: &str = "starvation";
pub const CAUSE_OLD_AGE: &str = "old_age";

/// Ladder checked for upward resource crossings.
pub const RESOURCE_THRESHOLDS: [f64; 7] = [10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0];

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// The full document after a transition.
    Tick(Box<World>),
    ActionComplete {
        action: Action,
        tick: Tick,
    },
    EntityAte {
        entity: Entity,
        food: String,
        tick: Tick,
    },
    EntityDied {
        entity: Entity,
        cause: String, // "starvation" | "old_age" | extension-defined
        tick: Tick,
    },
    Threshold {
        resource: String,
        threshold: f64,
        tick: Tick,
    },
    Boredom {
        level: u64,
        tick: Tick,
    },
    /// Anything an extension wants to publish.
    Custom {
        topic: String,
        payload: Value,
    },
}

impl WorldEvent {
    pub fn topic(&self) -> &str {
        match self {
            Self::Tick(_)               => topic::TICK,
            Self::ActionComplete { .. } => topic::ACTION_COMPLETE,
            Self::EntityAte { .. }      => topic::ENTITY_ATE,
            Self::EntityDied { .. }     => topic::ENTITY_DIED,
            Self::Threshold { .. }      => topic::THRESHOLD,
            Self::Boredom { .. }        => topic::BOREDOM,
            Self::Custom { topic, .. }  => topic,
        }
    }

    /// The JSON payload handed to subscribers.
    pub fn payload(&self) -> SimResult<Value> {
        let value = match self {
            Self::Tick(world) => serde_json::to_value(world.as_ref())?,
            Self::ActionComplete { action, tick } => json!({
                "action": serde_json::to_value(action)?,
                "tick": tick,
            }),
            Self::EntityAte { entity, food, tick } => json!({
                "entity": serde_json::to_value(entity)?,
                "food": food,
                "tick": tick,
            }),
            Self::EntityDied { entity, cause, tick } => json!({
                "entity": serde_json::to_value(entity)?,
                "cause": cause,
                "tick": tick,
            }),
            Self::Threshold { resource, threshold, tick } => json!({
                "type": "resource",
                "resource": resource,
                "threshold": threshold,
                "tick": tick,
            }),
            Self::Boredom { level, tick } => json!({
                "level": level,
                "tick": tick,
            }),
            Self::Custom { payload, .. } => payload.clone(),
        };
        Ok(value)
    }
}
