//! Shared primitive types used across the entire simulation.

use std::collections::BTreeMap;

/// A simulation tick. One tick = one wall-clock second in the live loop.
pub type Tick = u64;

/// A stable identifier for an entity in the world document.
pub type EntityId = String;

/// Identity of whoever owns a bus subscription (an extension id, or "engine").
pub type OwnerId = String;

/// Resource name → quantity. Used for system rates and action effects.
pub type ResourceDelta = BTreeMap<String, f64>;
