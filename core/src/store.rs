//! World document persistence.
//!
//! RULE: Only store.rs touches the state file.
//! Writes are atomic: serialize to a sibling temp file, flush to disk,
//! rename over the target. The file on disk is always either the previous
//! complete document or the new one.
//!
//! Every clone of a store shares one in-process *live copy*: the newest
//! document anyone in this process has staged or saved. `load()` prefers
//! it over the file, so an extension that loads mid-tick sees the engine's
//! current document rather than whatever was last flushed to disk.

use crate::{
    error::SimResult,
    world::World,
};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Default)]
struct LiveCopy {
    world:    Option<World>,
    revision: u64,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    live: Rc<RefCell<LiveCopy>>,
}

impl StateStore {
    /// A store backed by the document at `path`. Nothing is read yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            live: Rc::new(RefCell::new(LiveCopy::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a document has ever been persisted at `path`.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The current document: the live copy if there is one, otherwise the
    /// persisted file, otherwise a fresh default.
    /// A corrupt file counts as absent; out-of-range quantities in a
    /// readable file are repaired.
    pub fn load(&self) -> World {
        if let Some(world) = &self.live.borrow().world {
            return world.clone();
        }
        self.read_persisted().unwrap_or_default()
    }

    /// Read the file itself, ignoring the live copy.
    pub fn read_persisted(&self) -> Option<World> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("state: cannot read {}: {e}; starting fresh", self.path.display());
                return None;
            }
        };
        match serde_json::from_str::<World>(&content) {
            Ok(mut world) => {
                for fix in world.repair() {
                    log::warn!("state: {}: {fix}", self.path.display());
                }
                Some(world)
            }
            Err(e) => {
                log::warn!("state: {} is corrupt ({e}); treating as absent", self.path.display());
                None
            }
        }
    }

    /// Persist with the current wall time as `last_save_timestamp`.
    pub fn save(&self, world: &mut World) -> SimResult<()> {
        self.save_at(world, Utc::now())
    }

    /// Persist, stamped with `now`. `world` only takes the new
    /// `last_save_timestamp` once the file is in place.
    pub fn save_at(&self, world: &mut World, now: DateTime<Utc>) -> SimResult<()> {
        let mut stamped = world.clone();
        stamped.last_save_timestamp = Some(now);
        let json = serde_json::to_string_pretty(&stamped)?;
        write_atomic(&self.path, json.as_bytes())?;
        world.last_save_timestamp = Some(now);
        self.publish(world);
        log::debug!("tick={} state saved to {}", world.tick, self.path.display());
        Ok(())
    }

    /// Make `world` the live copy without writing it to disk.
    pub fn stage(&self, world: &World) {
        self.publish(world);
    }

    /// Bumped by every `stage` and `save`. Lets the engine notice that an
    /// extension wrote the document during dispatch.
    pub fn revision(&self) -> u64 {
        self.live.borrow().revision
    }

    /// Discard persisted state and start over from a default document.
    pub fn reset(&self) -> SimResult<World> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.live.borrow_mut().world = None;
        let mut world = World::default();
        self.save(&mut world)?;
        log::info!("state: reset {}", self.path.display());
        Ok(world)
    }

    fn publish(&self, world: &World) {
        let mut live = self.live.borrow_mut();
        live.world = Some(world.clone());
        live.revision += 1;
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> SimResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    let renamed = written.and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = renamed {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn temp_file_is_a_hidden_sibling() {
        let tmp = temp_path(Path::new("state/game.json"));
        assert_eq!(tmp.parent(), Some(Path::new("state")));
        let name = tmp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".game.json."), "unexpected temp name {name}");
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn failed_write_leaves_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        let store = StateStore::open(&path);
        let mut world = World::default();
        world.tick = 7;
        store.save(&mut world).unwrap();

        // A directory where the temp file should go makes the write fail.
        fs::create_dir(temp_path(&path)).unwrap();
        world.tick = 8;
        assert!(store.save(&mut world).is_err());

        let on_disk = store.read_persisted().expect("previous document survives");
        assert_eq!(on_disk.tick, 7);
    }

    #[test]
    fn failed_write_keeps_the_previous_save_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        let store = StateStore::open(&path);
        let mut world = World::default();
        let saved_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        store.save_at(&mut world, saved_at).unwrap();
        let revision = store.revision();

        fs::create_dir(temp_path(&path)).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap();
        assert!(store.save_at(&mut world, later).is_err());

        assert_eq!(world.last_save_timestamp, Some(saved_at));
        assert_eq!(store.load().last_save_timestamp, Some(saved_at));
        assert_eq!(store.revision(), revision);
    }
}
