use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::shared::write_atomic;
use super::{OverrideMap, StoreError};

/// Name of one local cache slot; one per diagram variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub const PREFIX: &'static str = "family-tree.positions";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn for_variant(variant: &str) -> Self {
        Self(format!("{}.{variant}", Self::PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name safe form: anything outside `[A-Za-z0-9._-]` becomes `_`.
    fn file_name(&self) -> String {
        let stem: String = self
            .0
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        format!("{stem}.json")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local, per-client persistence tier. Reads and writes are whole maps.
pub trait LocalCache {
    fn read(&self, key: &CacheKey) -> Result<Option<OverrideMap>, StoreError>;
    fn write(&self, key: &CacheKey, positions: &OverrideMap) -> Result<(), StoreError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl LocalCache for FileCache {
    fn read(&self, key: &CacheKey) -> Result<Option<OverrideMap>, StoreError> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| StoreError::json(&path, err))
    }

    fn write(&self, key: &CacheKey, positions: &OverrideMap) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(positions).map_err(|err| StoreError::json(&path, err))?;
        write_atomic(&self.dir, &path, &bytes)
    }
}

/// Process-local cache, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    slots: Arc<Mutex<HashMap<CacheKey, String>>>,
}

impl MemoryCache {
    /// Stores raw text under a key, bypassing serialization.
    pub fn insert_raw(&self, key: &CacheKey, raw: impl Into<String>) {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.insert(key.clone(), raw.into());
    }
}

impl LocalCache for MemoryCache {
    fn read(&self, key: &CacheKey) -> Result<Option<OverrideMap>, StoreError> {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(raw) = slots.get(key) else {
            return Ok(None);
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|err| StoreError::json(Path::new(key.as_str()), err))
    }

    fn write(&self, key: &CacheKey, positions: &OverrideMap) -> Result<(), StoreError> {
        let raw = serde_json::to_string(positions)
            .map_err(|err| StoreError::json(Path::new(key.as_str()), err))?;
        self.insert_raw(key, raw);
        Ok(())
    }
}
