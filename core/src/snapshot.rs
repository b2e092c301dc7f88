//! Status snapshot: a compact, serializable summary of a world document.
//!
//! Used by the runner's `--status` flag and by tests. Never written back.

use crate::{types::Tick, world::World};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldStatus {
    pub tick:                Tick,
    pub resources:           BTreeMap<String, f64>,
    pub systems:             Vec<String>,
    /// "name (Nt)" for each queued action.
    pub actions:             Vec<String>,
    pub tiles:               Vec<String>,
    pub entities:            usize,
    pub boredom:             u64,
    pub last_save_timestamp: Option<DateTime<Utc>>,
}

impl WorldStatus {
    pub fn of(world: &World) -> Self {
        Self {
            tick:      world.tick,
            resources: world.resources.amounts().clone(),
            systems:   world.systems.keys().cloned().collect(),
            actions:   world
                .queues
                .actions
                .iter()
                .map(|a| format!("{} ({}t)", a.name, a.ticks_remaining))
                .collect(),
            tiles:     world.map.tiles.keys().cloned().collect(),
            entities:  world.entities.len(),
            boredom:   world.boredom,
            last_save_timestamp: world.last_save_timestamp,
        }
    }
}

impl fmt::Display for WorldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tick:      {}", self.tick)?;
        let resources: Vec<String> = self
            .resources
            .iter()
            .map(|(name, amount)| format!("{name}={amount:.2}"))
            .collect();
        writeln!(f, "Resources: {}", resources.join(", "))?;
        writeln!(f, "Systems:   {}", self.systems.join(", "))?;
        writeln!(f, "Actions:   {}", self.actions.join(", "))?;
        writeln!(f, "Tiles:     {}", self.tiles.join(", "))?;
        writeln!(f, "Entities:  {}", self.entities)?;
        write!(f, "Boredom:   {}", self.boredom)
    }
}
