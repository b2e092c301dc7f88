//! The runtime engine: drives the world forward in real time.
//!
//! ONE TICK (fixed order, never reordered):
//!   1. `transition::apply` on a copy of the document
//!   2. threshold detection, then boredom detection
//!   3. stage the new document in the store; persist every Nth tick
//!   4. publish: transition events, then `tick`, then detector events
//!   5. sleep out the rest of the tick budget
//!
//! RULES:
//!   - The engine is the only long-lived owner of the document.
//!   - Extensions write through the store during dispatch; the engine
//!     adopts those writes before publishing the next event.
//!   - A failed tick is logged and retried next cycle. Nothing in here
//!     ends the process.
//!
//! Startup: load → catch-up → persist once → live loop.

use crate::{
    bus::{panic_message, EventBus},
    catch_up::{self, CatchUpReport},
    clock::{self, Clock, SystemClock},
    config::SimConfig,
    detect,
    error::{SimError, SimResult},
    event::{topic, WorldEvent},
    extension::Extension,
    registry::ExtensionRegistry,
    snapshot::WorldStatus,
    store::StateStore,
    transition,
    types::Tick,
    world::World,
};
use std::panic::{self, AssertUnwindSafe};

pub struct SimEngine {
    config:   SimConfig,
    store:    StateStore,
    bus:      EventBus,
    registry: ExtensionRegistry,
    clock:    Box<dyn Clock>,
    world:    World,
    /// Consecutive ticks that failed to apply.
    failed_ticks: u64,
}

impl SimEngine {
    /// A bare engine: no extensions, document loaded from `store`.
    pub fn new(config: SimConfig, store: StateStore, clock: Box<dyn Clock>) -> Self {
        let world = store.load();
        Self {
            config,
            store,
            bus: EventBus::new(),
            registry: ExtensionRegistry::new(),
            clock,
            world,
            failed_ticks: 0,
        }
    }

    /// Build a fully wired engine: system clock, state file from config,
    /// bundled extensions registered and loaded.
    /// Call this instead of new() + manual extension setup.
    pub fn build(config: SimConfig) -> Self {
        let store = StateStore::open(config.state_path.clone());
        if !store.exists() {
            log::info!("engine: no state at {}, starting fresh", store.path().display());
        }
        let registry = ExtensionRegistry::with_builtins(&config, &store);
        let mut engine = SimEngine::new(config, store, Box::new(SystemClock));
        engine.registry = registry;
        engine.load_extensions();
        engine
    }

    /// Make an extension available and register it on the bus.
    pub fn add_extension(&mut self, extension: Box<dyn Extension>) -> SimResult<()> {
        let id = extension.id();
        if !self.registry.add(extension) {
            return Err(SimError::RegistrationFailed {
                id: id.to_string(),
                reason: "duplicate extension id".into(),
            });
        }
        self.registry.load(id, &mut self.bus, &self.world)
    }

    /// Register every extension not yet loaded. Failures are isolated.
    pub fn load_extensions(&mut self) -> Vec<&'static str> {
        let loaded = self.registry.load_all(&mut self.bus, &self.world);
        log::debug!("engine: event handlers {:?}", self.bus.handlers());
        loaded
    }

    pub fn unload_extension(&mut self, id: &str) -> SimResult<()> {
        self.registry.unload(id, &mut self.bus)
    }

    pub fn reload_extension(&mut self, id: &str) -> SimResult<()> {
        self.registry.reload(id, &mut self.bus, &self.world)
    }

    pub fn world(&self) -> &World { &self.world }
    pub fn store(&self) -> &StateStore { &self.store }
    pub fn bus(&self) -> &EventBus { &self.bus }
    pub fn bus_mut(&mut self) -> &mut EventBus { &mut self.bus }
    pub fn registry(&self) -> &ExtensionRegistry { &self.registry }
    pub fn config(&self) -> &SimConfig { &self.config }
    pub fn failed_ticks(&self) -> u64 { self.failed_ticks }

    pub fn status(&self) -> WorldStatus {
        WorldStatus::of(&self.world)
    }

    /// Startup phase: replay downtime, then persist once.
    /// A failing catch-up degrades to "no catch-up".
    pub fn start(&mut self) -> CatchUpReport {
        let report = self.catch_up();
        self.persist();
        report
    }

    /// Replay missed ticks since the last save. Does not persist.
    pub fn catch_up(&mut self) -> CatchUpReport {
        let now = self.clock.now();
        let mut candidate = self.world.clone();
        let catch_up_config = &self.config.catch_up;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            catch_up::reconcile(&mut candidate, now, catch_up_config)
        }));
        match outcome {
            Ok(Ok(report)) => {
                self.world = candidate;
                self.store.stage(&self.world);
                report
            }
            Ok(Err(e)) => {
                log::error!("catch-up failed, skipping: {e}");
                CatchUpReport::default()
            }
            Err(panic) => {
                log::error!("catch-up panicked, skipping: {}", panic_message(panic.as_ref()));
                CatchUpReport::default()
            }
        }
    }

    /// Run forever at one tick per `tick_interval`.
    pub fn run(&mut self) -> ! {
        log::info!("engine: starting live loop at tick {}", self.world.tick);
        loop {
            self.paced_step();
        }
    }

    /// Run `n` paced cycles, then persist. Used by bounded runs.
    pub fn run_for(&mut self, n: u64) {
        for _ in 0..n {
            self.paced_step();
        }
        self.persist();
    }

    /// `n` full ticks with dispatch and no pacing, then persist.
    pub fn advance(&mut self, n: u64) -> SimResult<()> {
        for i in 0..n {
            self.step()?;
            if (i + 1) % 10 == 0 {
                log::debug!("sim: tick {}", self.world.tick);
            }
        }
        self.save()?;
        log::info!("sim: advanced to tick {}", self.world.tick);
        Ok(())
    }

    /// `n` ticks with no dispatch and no detectors, one save at the end.
    pub fn fast_forward(&mut self, n: u64) -> SimResult<()> {
        let mut world = self.world.clone();
        for i in 0..n {
            let (next, _events) = transition::apply(world)?;
            world = next;
            if (i + 1) % 1000 == 0 {
                log::debug!("ff: tick {}", world.tick);
            }
        }
        self.world = world;
        self.save()?;
        log::info!("ff: fast-forwarded to tick {}", self.world.tick);
        Ok(())
    }

    /// Persist the current document now.
    pub fn save(&mut self) -> SimResult<()> {
        let now = self.clock.now();
        self.store.save_at(&mut self.world, now)
    }

    /// One tick: transition, detection, persistence, dispatch.
    /// Returns the events produced (everything published except `tick`).
    /// On failure the document is left exactly as it was.
    pub fn step(&mut self) -> SimResult<Vec<WorldEvent>> {
        let previous = self.world.resources.clone();
        let (mut next, events) = self.apply_guarded()?;

        let mut detected = detect::thresholds(&previous, &next);
        detected.extend(detect::boredom(&mut next, self.config.boredom_threshold));

        self.world = next;
        self.store.stage(&self.world);
        if self.world.tick % self.config.save_interval() == 0 {
            self.persist();
        }

        let mut revision = self.store.revision();
        for event in &events {
            self.bus.publish(event);
            revision = self.adopt_extension_writes(revision);
        }

        if self.bus.subscriber_count(topic::TICK) > 0 {
            self.bus.publish(&WorldEvent::Tick(Box::new(self.world.clone())));
            revision = self.adopt_extension_writes(revision);
        }

        for event in &detected {
            self.bus.publish(event);
            revision = self.adopt_extension_writes(revision);
        }

        let mut produced = events;
        produced.extend(detected);
        Ok(produced)
    }

    fn paced_step(&mut self) {
        let started = self.clock.now();
        let tick: Tick = self.world.tick + 1;

        match self.step() {
            Ok(_) => self.failed_ticks = 0,
            Err(e) => {
                self.failed_ticks += 1;
                log::error!(
                    "tick={tick} transition failed ({} in a row), retrying next cycle: {e}",
                    self.failed_ticks
                );
            }
        }

        let spent = clock::elapsed(started, self.clock.now());
        self.clock.sleep(clock::remaining_budget(self.config.tick_interval(), spent));
    }

    fn apply_guarded(&self) -> SimResult<(World, Vec<WorldEvent>)> {
        let input = self.world.clone();
        let tick = input.tick + 1;
        match panic::catch_unwind(AssertUnwindSafe(|| transition::apply(input))) {
            Ok(result) => result,
            Err(panic) => Err(SimError::TransitionPanicked {
                tick,
                message: panic_message(panic.as_ref()),
            }),
        }
    }

    /// If anything saved or staged since `seen`, take the store's copy.
    fn adopt_extension_writes(&mut self, seen: u64) -> u64 {
        let current = self.store.revision();
        if current != seen {
            self.world = self.store.load();
        }
        current
    }

    /// Save, logging instead of failing. The live loop must not stop on I/O.
    fn persist(&mut self) {
        if let Err(e) = self.save() {
            log::error!("tick={} persist failed: {e}", self.world.tick);
        }
    }
}
