//! Extension registry.
//!
//! Holds typed extension handles and loads them onto the bus. A module
//! that fails to register (error or panic) is logged, stripped of any
//! subscriptions it managed to make, and skipped; the rest still load.

use crate::{
    bus::{panic_message, EventBus},
    config::SimConfig,
    error::{SimError, SimResult},
    exploration_extension::ExplorationExtension,
    extension::Extension,
    graveyard_extension::GraveyardExtension,
    store::StateStore,
    world::World,
};
use std::panic::{self, AssertUnwindSafe};

struct Entry {
    extension: Box<dyn Extension>,
    loaded:    bool,
}

#[derive(Default)]
pub struct ExtensionRegistry {
    entries: Vec<Entry>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The extensions bundled with the core, filtered by config.
    pub fn with_builtins(config: &SimConfig, store: &StateStore) -> Self {
        let mut registry = Self::new();
        let extensions = &config.extensions;
        if extensions.exploration.enabled {
            registry.add(Box::new(ExplorationExtension::new(
                store.clone(),
                extensions.exploration.clone(),
                config.seed,
            )));
        }
        if extensions.graveyard.enabled {
            registry.add(Box::new(GraveyardExtension::new(
                store.clone(),
                extensions.graveyard.clone(),
            )));
        }
        registry
    }

    /// Make an extension available. Ids must be unique; a duplicate is
    /// refused and logged.
    pub fn add(&mut self, extension: Box<dyn Extension>) -> bool {
        let id = extension.id();
        if self.position(id).is_some() {
            log::warn!("registry: extension {id} already added, ignoring duplicate");
            return false;
        }
        self.entries.push(Entry { extension, loaded: false });
        true
    }

    /// Register every extension not yet loaded. Returns the ids that
    /// loaded successfully; failures are logged and skipped.
    pub fn load_all(&mut self, bus: &mut EventBus, world: &World) -> Vec<&'static str> {
        let mut loaded = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| !e.loaded) {
            match register_entry(entry, bus, world) {
                Ok(()) => loaded.push(entry.extension.id()),
                Err(e) => log::error!("registry: {e}"),
            }
        }
        log::info!("registry: loaded {} extension(s): {loaded:?}", loaded.len());
        loaded
    }

    pub fn load(&mut self, id: &str, bus: &mut EventBus, world: &World) -> SimResult<()> {
        let index = self.require(id)?;
        let entry = &mut self.entries[index];
        if entry.loaded {
            return Ok(());
        }
        register_entry(entry, bus, world)
    }

    /// Unregister an extension. It stays available for `load`/`reload`.
    pub fn unload(&mut self, id: &str, bus: &mut EventBus) -> SimResult<()> {
        let index = self.require(id)?;
        let entry = &mut self.entries[index];
        if !entry.loaded {
            return Ok(());
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.extension.unregister(bus)));
        if let Err(panic) = outcome {
            log::error!("registry: {id} panicked while unregistering: {}", panic_message(panic.as_ref()));
        }
        bus.unregister(id);
        entry.loaded = false;
        log::info!("registry: unloaded {id}");
        Ok(())
    }

    pub fn reload(&mut self, id: &str, bus: &mut EventBus, world: &World) -> SimResult<()> {
        self.unload(id, bus)?;
        self.load(id, bus, world)
    }

    pub fn loaded(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| e.loaded)
            .map(|e| e.extension.id())
            .collect()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.position(id).is_some_and(|i| self.entries[i].loaded)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.extension.id() == id)
    }

    fn require(&self, id: &str) -> SimResult<usize> {
        self.position(id)
            .ok_or_else(|| SimError::ExtensionNotFound { id: id.to_string() })
    }
}

fn register_entry(entry: &mut Entry, bus: &mut EventBus, world: &World) -> SimResult<()> {
    let id = entry.extension.id();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.extension.register(bus, world)));
    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{e:#}")),
        Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
    };

    if let Some(reason) = failure {
        bus.unregister(id);
        return Err(SimError::RegistrationFailed { id: id.to_string(), reason });
    }

    entry.loaded = true;
    log::info!("registry: registered {id}");
    Ok(())
}
