use crate::types::Tick;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bounds on the offline backfill applied at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatchUpConfig {
    /// Ceiling on backfilled ticks, regardless of downtime.
    pub max_ticks: Tick,
    /// Gaps shorter than this are not worth replaying.
    pub min_ticks: Tick,
    /// Multiplier on hunger decay while nobody is watching.
    pub hunger_discount: f64,
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            max_ticks:       3600, // one hour
            min_ticks:       10,
            hunger_discount: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExplorationConfig {
    pub enabled: bool,
    pub dirt_per_discovery: f64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self { enabled: true, dirt_per_discovery: 1000.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraveyardConfig {
    pub enabled: bool,
    /// Oldest corpses are dropped past this many.
    pub max_corpses: usize,
}

impl Default for GraveyardConfig {
    fn default() -> Self {
        Self { enabled: true, max_corpses: 200 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub exploration: ExplorationConfig,
    pub graveyard: GraveyardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub state_path: PathBuf,
    /// Real-time budget for one tick.
    pub tick_interval_ms: u64,
    /// Persist every Nth tick. Zero is treated as one.
    pub save_every: Tick,
    pub boredom_threshold: u64,
    /// Master seed for extension RNG streams.
    pub seed: u64,
    pub catch_up: CatchUpConfig,
    pub extensions: ExtensionsConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            state_path:        PathBuf::from("state/game.json"),
            tick_interval_ms:  1000,
            save_every:        50,
            boredom_threshold: 60, // one minute of nothing
            seed:              0,
            catch_up:          CatchUpConfig::default(),
            extensions:        ExtensionsConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load from a JSON file. A missing file means defaults; any field
    /// left out of the file keeps its default.
    /// In tests, use SimConfig::default_test().
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: SimConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?;
        Ok(config)
    }

    /// No pacing, persist every tick, state under `state_path`.
    pub fn default_test() -> Self {
        Self {
            tick_interval_ms: 0,
            save_every: 1,
            ..Self::default()
        }
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }

    pub fn save_interval(&self) -> Tick {
        self.save_every.max(1)
    }
}
