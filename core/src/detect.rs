//! Threshold and idle detection. Runs once per tick, after `apply`.

use crate::{
    event::{WorldEvent, RESOURCE_THRESHOLDS},
    world::{Resources, World},
};

/// One `threshold` event per ladder rung crossed upward this tick.
pub fn thresholds(previous: &Resources, world: &World) -> Vec<WorldEvent> {
    let mut events = Vec::new();
    for (resource, amount) in world.resources.iter() {
        let before = previous.get(resource);
        for threshold in RESOURCE_THRESHOLDS {
            if before < threshold && threshold <= *amount {
                events.push(WorldEvent::Threshold {
                    resource: resource.clone(),
                    threshold,
                    tick: world.tick,
                });
            }
        }
    }
    events
}

/// Track the idle streak stored on the document.
///
/// An idle tick (no queued actions or events) raises the streak by one,
/// a busy tick lowers it by one. Reaching `threshold` yields a `boredom`
/// event and resets the streak. A zero threshold disables detection.
pub fn boredom(world: &mut World, threshold: u64) -> Option<WorldEvent> {
    if world.queues.is_idle() {
        world.boredom += 1;
    } else {
        world.boredom = world.boredom.saturating_sub(1);
    }

    if threshold == 0 || world.boredom < threshold {
        return None;
    }

    let level = world.boredom;
    world.boredom = 0;
    Some(WorldEvent::Boredom { level, tick: world.tick })
}
