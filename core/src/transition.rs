//! The transition function. One call = one tick.
//!
//! RESOLUTION ORDER (fixed, never reordered):
//!   1. Action queue
//!   2. Systems       (ascending system id)
//!   3. Entities      (document order)
//!
//! RULES:
//!   - `apply` is a pure function of its input document.
//!   - It never touches the bus, the store, the clock or an RNG.
//!   - Consumption is always checked before it is applied; a resource
//!     balance can never go negative.

use crate::{
    error::SimResult,
    event::{WorldEvent, CAUSE_OLD_AGE, CAUSE_STARVATION},
    world::{Entity, Resources, System, World},
};
use std::collections::BTreeMap;

pub const HUNGER_THRESHOLD_EAT: f64 = 50.0;
pub const HUNGER_GAIN_FROM_EATING: f64 = 30.0;
pub const MAX_HUNGER: f64 = 100.0;
pub const FOOD_PER_MEAL: f64 = 1.0;

/// Advance the document by exactly one tick.
///
/// Returns the next document and the domain events the tick produced,
/// in resolution order. Fails only on a document that is already invalid
/// (negative or non-finite quantities); the input is consumed either way,
/// so callers that want to retry keep their own copy.
pub fn apply(mut world: World) -> SimResult<(World, Vec<WorldEvent>)> {
    world.validate()?;

    world.tick += 1;
    let mut events = Vec::new();

    resolve_actions(&mut world, &mut events);
    resolve_systems(&world.systems, &mut world.resources);
    resolve_entities(&mut world, &mut events);

    Ok((world, events))
}

fn resolve_actions(world: &mut World, events: &mut Vec<WorldEvent>) {
    let tick = world.tick;
    let pending = std::mem::take(&mut world.queues.actions);

    for mut action in pending {
        action.ticks_remaining = action.ticks_remaining.saturating_sub(1);
        if action.ticks_remaining > 0 {
            world.queues.actions.push(action);
            continue;
        }
        for (resource, delta) in &action.effects.resources {
            world.resources.credit(resource, *delta);
        }
        events.push(WorldEvent::ActionComplete { action, tick });
    }
}

/// Run every affordable system once. Shared with the catch-up pass.
/// Returns how many systems were active.
pub(crate) fn resolve_systems(systems: &BTreeMap<String, System>, resources: &mut Resources) -> usize {
    let mut active = 0;
    for system in systems.values() {
        if !system.is_well_formed() || !resources.debit(&system.consumes) {
            continue;
        }
        for (resource, amount) in &system.generates {
            resources.credit(resource, *amount);
        }
        active += 1;
    }
    active
}

fn resolve_entities(world: &mut World, events: &mut Vec<WorldEvent>) {
    let tick = world.tick;
    let living = std::mem::take(&mut world.entities);

    for mut entity in living {
        entity.age += 1;
        entity.hunger -= entity.hunger_rate;

        if let Some(food) = feed(&mut entity, &mut world.resources) {
            events.push(WorldEvent::EntityAte { entity: entity.clone(), food, tick });
        }

        match death_cause(&entity) {
            Some(cause) => events.push(WorldEvent::EntityDied {
                entity,
                cause: cause.to_string(),
                tick,
            }),
            None => world.entities.push(entity),
        }
    }
}

/// Eat one unit of the entity's food if it is hungry and food is in stock.
/// Returns the food eaten.
pub(crate) fn feed(entity: &mut Entity, resources: &mut Resources) -> Option<String> {
    if entity.hunger >= HUNGER_THRESHOLD_EAT {
        return None;
    }
    let food = entity.food.as_ref()?;
    let meal = BTreeMap::from([(food.clone(), FOOD_PER_MEAL)]);
    if !resources.debit(&meal) {
        return None;
    }
    entity.hunger = (entity.hunger + HUNGER_GAIN_FROM_EATING).min(MAX_HUNGER);
    Some(food.clone())
}

/// Starvation wins over old age when both hold.
pub(crate) fn death_cause(entity: &Entity) -> Option<&'static str> {
    if entity.hunger <= 0.0 {
        Some(CAUSE_STARVATION)
    } else if entity.age >= entity.max_age {
        Some(CAUSE_OLD_AGE)
    } else {
        None
    }
}
