use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::history::{HistoryQuery, PositionHistoryEntry, diff_overrides, record_changes, replay};
use super::{Actor, OverrideMap, StoreError};

/// Body of a save: the complete override map, never a delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavePositionsRequest {
    pub positions: OverrideMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    /// Number of keys in the new shared copy.
    pub saved: usize,
    /// History entries appended by this save.
    pub entries: Vec<PositionHistoryEntry>,
}

/// Authoritative tier visible to every client.
///
/// `replace` overwrites the stored map wholesale (last writer wins) and
/// appends one history entry per created, updated or deleted key.
pub trait SharedStore {
    fn fetch(&self) -> Result<OverrideMap, StoreError>;
    fn replace(&self, actor: &Actor, request: &SavePositionsRequest) -> Result<SaveReport, StoreError>;
    fn history(&self, actor: &Actor, query: &HistoryQuery) -> Result<Vec<PositionHistoryEntry>, StoreError>;
}

fn validate(request: &SavePositionsRequest) -> Result<(), StoreError> {
    match request.positions.iter().find(|(_, pos)| !pos.is_finite()) {
        Some((id, _)) => Err(StoreError::InvalidPosition { id: id.clone() }),
        None => Ok(()),
    }
}

/// Computes the entries a save appends to `log`, given the previous copy.
fn apply_save(
    actor: &Actor,
    previous: &OverrideMap,
    request: &SavePositionsRequest,
    log: &[PositionHistoryEntry],
) -> Vec<PositionHistoryEntry> {
    let last_id = log.iter().map(|entry| entry.id).max().unwrap_or(0);
    record_changes(
        diff_overrides(previous, &request.positions),
        last_id,
        &actor.name,
        Utc::now(),
    )
}

/// Shared copy kept as two JSON documents in a directory:
/// `positions.json` (the map) and `positions-history.json` (the audit log).
#[derive(Debug, Clone)]
pub struct FileSharedStore {
    dir: PathBuf,
}

impl FileSharedStore {
    pub const POSITIONS_FILE: &'static str = "positions.json";
    pub const HISTORY_FILE: &'static str = "positions-history.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn positions_path(&self) -> PathBuf {
        self.dir.join(Self::POSITIONS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(Self::HISTORY_FILE)
    }

    fn read_log(&self) -> Result<Vec<PositionHistoryEntry>, StoreError> {
        Ok(read_json(&self.history_path())?.unwrap_or_default())
    }

    /// The copy a save is diffed against. The log is written before the map,
    /// so once it has entries it is the record of what was last saved, even
    /// if the map write of that save never landed.
    fn previous_copy(&self, log: &[PositionHistoryEntry]) -> Result<OverrideMap, StoreError> {
        if log.is_empty() {
            Ok(read_json(&self.positions_path())?.unwrap_or_default())
        } else {
            Ok(replay(log))
        }
    }
}

impl SharedStore for FileSharedStore {
    fn fetch(&self) -> Result<OverrideMap, StoreError> {
        let path = self.positions_path();
        if !self.dir.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "shared directory {} does not exist",
                self.dir.display()
            )));
        }
        Ok(read_json(&path)?.unwrap_or_default())
    }

    fn replace(&self, actor: &Actor, request: &SavePositionsRequest) -> Result<SaveReport, StoreError> {
        actor.require_save()?;
        validate(request)?;
        let mut log = self.read_log()?;
        let previous = self.previous_copy(&log)?;
        let entries = apply_save(actor, &previous, request, &log);

        if !entries.is_empty() {
            log.extend(entries.iter().cloned());
            let history_path = self.history_path();
            let bytes =
                serde_json::to_vec_pretty(&log).map_err(|err| StoreError::json(&history_path, err))?;
            write_atomic(&self.dir, &history_path, &bytes)?;
        }

        let positions_path = self.positions_path();
        let bytes = serde_json::to_vec_pretty(&request.positions)
            .map_err(|err| StoreError::json(&positions_path, err))?;
        write_atomic(&self.dir, &positions_path, &bytes)?;
        tracing::debug!(
            dir = %self.dir.display(),
            saved = request.positions.len(),
            changes = entries.len(),
            "shared positions replaced"
        );
        Ok(SaveReport {
            saved: request.positions.len(),
            entries,
        })
    }

    fn history(&self, actor: &Actor, query: &HistoryQuery) -> Result<Vec<PositionHistoryEntry>, StoreError> {
        actor.require_history()?;
        Ok(query.select(&self.read_log()?))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io(path, err)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|err| StoreError::json(path, err))
}

/// Replaces `path` (inside `dir`) by writing a sibling temp file and renaming
/// it over the target, so readers never see a half-written document.
pub(crate) fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|err| StoreError::io(dir, err))?;
    let Some(file_name) = path.file_name() else {
        return Err(StoreError::io(path, io::Error::other("path has no file name")));
    };
    let parent = path.parent().unwrap_or(dir);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = parent.join(format!(
        ".{}.tmp.{}.{nanos}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|err| StoreError::io(&tmp_path, err))?;
    if let Err(err) = file.write_all(contents).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::io(&tmp_path, err));
    }
    drop(file);

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::io(path, err));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct MemoryShared {
    positions: OverrideMap,
    log: Vec<PositionHistoryEntry>,
    offline: bool,
}

/// In-process shared tier. Clones share state, so several
/// [`super::OverrideStore`]s can act as separate clients of one copy.
#[derive(Debug, Clone, Default)]
pub struct MemorySharedStore {
    inner: Arc<Mutex<MemoryShared>>,
}

impl MemorySharedStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryShared> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the stored copy without recording history.
    pub fn seed(&self, positions: OverrideMap) {
        self.lock().positions = positions;
    }

    /// Simulates the shared tier going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.lock().offline = !available;
    }

    pub fn log(&self) -> Vec<PositionHistoryEntry> {
        self.lock().log.clone()
    }

    fn ensure_available(state: &MemoryShared) -> Result<(), StoreError> {
        if state.offline {
            Err(StoreError::Unavailable("shared store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SharedStore for MemorySharedStore {
    fn fetch(&self) -> Result<OverrideMap, StoreError> {
        let state = self.lock();
        Self::ensure_available(&state)?;
        Ok(state.positions.clone())
    }

    fn replace(&self, actor: &Actor, request: &SavePositionsRequest) -> Result<SaveReport, StoreError> {
        let mut state = self.lock();
        Self::ensure_available(&state)?;
        actor.require_save()?;
        validate(request)?;
        let entries = apply_save(actor, &state.positions, request, &state.log);
        state.positions = request.positions.clone();
        state.log.extend(entries.iter().cloned());
        Ok(SaveReport {
            saved: request.positions.len(),
            entries,
        })
    }

    fn history(&self, actor: &Actor, query: &HistoryQuery) -> Result<Vec<PositionHistoryEntry>, StoreError> {
        let state = self.lock();
        Self::ensure_available(&state)?;
        actor.require_history()?;
        Ok(query.select(&state.log))
    }
}
