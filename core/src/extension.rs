//! Extension trait.
//!
//! RULE: Every behaviour module outside the core implements Extension.
//! Extensions react to bus topics and never take part in the transition
//! function. State they need across ticks lives in the world document
//! (under `meta`), never in the extension value itself.

use crate::{bus::EventBus, world::World};

/// The contract every extension must fulfill.
pub trait Extension {
    /// Unique stable id. Also the owner id of every subscription the
    /// extension makes, so `unregister` can find them.
    fn id(&self) -> &'static str;

    /// Called once at load time. May subscribe to topics and read `world`;
    /// must not keep a reference to it.
    fn register(&mut self, bus: &mut EventBus, world: &World) -> anyhow::Result<()>;

    /// Remove everything `register` subscribed.
    fn unregister(&mut self, bus: &mut EventBus) {
        bus.unregister(self.id());
    }
}
