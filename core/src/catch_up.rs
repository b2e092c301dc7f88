//! Offline catch-up. Runs once at startup, before the live loop.
//!
//! Downtime since `last_save_timestamp` is replayed as reduced-fidelity
//! ticks, capped at `CatchUpConfig::max_ticks`:
//!   - systems resolve exactly as in a live tick
//!   - entities age, hunger decays at a discount, they eat if they can
//!   - the dead are removed silently: no events, no death bookkeeping

use crate::{
    config::CatchUpConfig,
    error::SimResult,
    transition::{death_cause, feed, resolve_systems},
    types::Tick,
    world::World,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatchUpReport {
    /// Whole seconds between the last save and now.
    pub elapsed_secs: i64,
    /// Ticks actually applied.
    pub applied: Tick,
    /// True when downtime exceeded the ceiling.
    pub capped: bool,
    /// Entities that did not survive the gap.
    pub lost_entities: usize,
}

/// How many reduced ticks a gap is worth. Zero when there is no previous
/// save, the clock went backwards, or the gap is too small to bother.
pub fn ticks_owed(last_save: Option<DateTime<Utc>>, now: DateTime<Utc>, config: &CatchUpConfig) -> Tick {
    let Some(last_save) = last_save else {
        return 0;
    };
    let elapsed = (now - last_save).num_seconds();
    if elapsed <= 0 {
        return 0;
    }
    let ticks = (elapsed as Tick).min(config.max_ticks);
    if ticks < config.min_ticks {
        return 0;
    }
    ticks
}

/// Replay the gap between the document's last save and `now`.
/// Does not persist; the caller saves once afterwards.
pub fn reconcile(world: &mut World, now: DateTime<Utc>, config: &CatchUpConfig) -> SimResult<CatchUpReport> {
    let mut report = CatchUpReport {
        elapsed_secs: world
            .last_save_timestamp
            .map(|last| (now - last).num_seconds())
            .unwrap_or(0),
        ..CatchUpReport::default()
    };

    let ticks = ticks_owed(world.last_save_timestamp, now, config);
    if ticks == 0 {
        log::debug!("catch-up: nothing to apply ({}s elapsed)", report.elapsed_secs);
        return Ok(report);
    }

    world.validate()?;
    report.capped = report.elapsed_secs as u64 > config.max_ticks;

    log::info!(
        "catch-up: applying {ticks} offline ticks ({}s elapsed, capped at {})",
        report.elapsed_secs,
        config.max_ticks
    );

    for _ in 0..ticks {
        report.lost_entities += step_reduced(world, config.hunger_discount);
    }
    report.applied = ticks;

    log::info!(
        "catch-up: complete, now at tick {} ({} entities lost)",
        world.tick,
        report.lost_entities
    );
    Ok(report)
}

/// One reduced-fidelity tick. Returns how many entities were removed.
pub fn step_reduced(world: &mut World, hunger_discount: f64) -> usize {
    world.tick += 1;
    resolve_systems(&world.systems, &mut world.resources);

    for entity in &mut world.entities {
        entity.age += 1;
        entity.hunger -= entity.hunger_rate * hunger_discount;
        feed(entity, &mut world.resources);
    }

    let before = world.entities.len();
    world.entities.retain(|e| death_cause(e).is_none());
    before - world.entities.len()
}
