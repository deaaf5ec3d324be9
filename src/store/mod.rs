//! Position override store.
//!
//! Two tiers hold the user-chosen node positions: a local cache mirrored on
//! every drag, and an authoritative shared copy that only changes on an
//! explicit save. [`OverrideStore`] owns the in-memory map and talks to both.

pub mod cache;
pub mod history;
pub mod shared;

pub use cache::{CacheKey, FileCache, LocalCache, MemoryCache};
pub use history::{HistoryAction, HistoryQuery, PositionChange, PositionHistoryEntry, diff_overrides, replay};
pub use shared::{FileSharedStore, MemorySharedStore, SavePositionsRequest, SaveReport, SharedStore};

use crate::ir::PersonId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// User-chosen centre of one node. Distinct from
/// [`crate::layout::LayoutPosition`], which the pipeline computes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionOverride {
    pub x: f32,
    pub y: f32,
}

impl PositionOverride {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Overrides keyed by person id. Keys for persons that no longer exist are
/// kept and ignored at render time.
pub type OverrideMap = BTreeMap<PersonId, PositionOverride>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Role {
    pub fn can_save(self) -> bool {
        matches!(self, Self::Admin | Self::Editor)
    }

    pub fn can_read_history(self) -> bool {
        self == Self::Admin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// Caller identity as resolved by the host's authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    fn require(&self, allowed: bool, action: &'static str) -> Result<(), StoreError> {
        if allowed {
            Ok(())
        } else {
            Err(StoreError::Unauthorized {
                actor: self.name.clone(),
                role: self.role,
                action,
            })
        }
    }

    pub(crate) fn require_save(&self) -> Result<(), StoreError> {
        self.require(self.role.can_save(), "save positions")
    }

    pub(crate) fn require_history(&self) -> Result<(), StoreError> {
        self.require(self.role.can_read_history(), "read position history")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{actor} ({role}) is not allowed to {action}")]
    Unauthorized {
        actor: String,
        role: Role,
        action: &'static str,
    },
    #[error("shared store unavailable: {0}")]
    Unavailable(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("position for {id} is not a finite point")]
    InvalidPosition { id: PersonId },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// User-facing notice. Permission problems read differently from
    /// transient failures so users know whether retrying can help.
    pub fn notice(&self) -> Notice {
        match self {
            Self::Unauthorized { action, .. } => Notice {
                kind: NoticeKind::NotAllowed,
                message: format!("You do not have permission to {action}."),
            },
            Self::InvalidPosition { id } => Notice {
                kind: NoticeKind::Invalid,
                message: format!("The position for {id} is invalid."),
            },
            _ => Notice {
                kind: NoticeKind::TryAgain,
                message: "Positions could not be reached. Your changes are kept locally; try again later."
                    .to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    NotAllowed,
    TryAgain,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Tier the current map was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Shared,
    Cache,
    Empty,
}

/// In-memory override map plus its two persistence tiers.
///
/// Drags touch only memory and the local cache. The shared tier is read on
/// [`mount`](Self::mount) and written only on [`save`](Self::save).
pub struct OverrideStore<C: LocalCache, S: SharedStore> {
    cache: C,
    shared: S,
    key: CacheKey,
    positions: OverrideMap,
    source: LoadSource,
    dirty: bool,
}

impl<C: LocalCache, S: SharedStore> OverrideStore<C, S> {
    pub fn new(cache: C, shared: S, key: CacheKey) -> Self {
        Self {
            cache,
            shared,
            key,
            positions: OverrideMap::new(),
            source: LoadSource::Empty,
            dirty: false,
        }
    }

    pub fn positions(&self) -> &OverrideMap {
        &self.positions
    }

    pub fn source(&self) -> LoadSource {
        self.source
    }

    /// Whether local changes exist that the shared copy has not seen.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn shared(&self) -> &S {
        &self.shared
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Loads the shared copy, falling back to the local cache, then to an
    /// empty map. Whichever tier answers replaces the in-memory map; a shared
    /// answer is also mirrored into the cache.
    pub fn mount(&mut self) -> LoadSource {
        self.load(true)
    }

    /// Same read order as [`Self::mount`], but the local cache is left as it
    /// is, so an unsaved session survives a read-only view.
    pub fn peek(&mut self) -> LoadSource {
        self.load(false)
    }

    /// Loads only the local cache, continuing an unsaved session.
    pub fn resume(&mut self) -> LoadSource {
        self.load_cached()
    }

    /// Continues the cached session, or mounts when this client has none yet.
    /// Edits then start from the shared copy instead of an empty map.
    pub fn open_session(&mut self) -> LoadSource {
        match self.resume() {
            LoadSource::Empty => self.mount(),
            source => source,
        }
    }

    fn load(&mut self, mirror: bool) -> LoadSource {
        match self.shared.fetch() {
            Ok(positions) => {
                tracing::debug!(count = positions.len(), "loaded shared positions");
                self.positions = positions;
                self.source = LoadSource::Shared;
                self.dirty = false;
                if mirror {
                    self.mirror();
                }
                return self.source;
            }
            Err(err) => tracing::warn!(error = %err, "shared positions unavailable, trying local cache"),
        }
        self.load_cached()
    }

    fn load_cached(&mut self) -> LoadSource {
        match self.cache.read(&self.key) {
            Ok(Some(positions)) => {
                tracing::debug!(count = positions.len(), key = %self.key, "loaded cached positions");
                self.positions = positions;
                self.source = LoadSource::Cache;
                self.dirty = true;
            }
            Ok(None) => {
                self.positions.clear();
                self.source = LoadSource::Empty;
                self.dirty = false;
            }
            Err(err) => {
                tracing::warn!(error = %err, key = %self.key, "local cache unreadable, starting empty");
                self.positions.clear();
                self.source = LoadSource::Empty;
                self.dirty = false;
            }
        }
        self.source
    }

    /// Records one pointer move of a drag. Never touches the shared tier.
    pub fn drag_to(&mut self, id: PersonId, x: f32, y: f32) -> Result<(), StoreError> {
        let position = PositionOverride::new(x, y);
        if !position.is_finite() {
            return Err(StoreError::InvalidPosition { id });
        }
        self.positions.insert(id, position);
        self.dirty = true;
        self.mirror();
        Ok(())
    }

    /// Drops the override of one node so it returns to its computed position.
    pub fn remove(&mut self, id: &PersonId) -> Option<PositionOverride> {
        let removed = self.positions.remove(id);
        if removed.is_some() {
            self.dirty = true;
            self.mirror();
        }
        removed
    }

    pub fn clear(&mut self) {
        if self.positions.is_empty() {
            return;
        }
        self.positions.clear();
        self.dirty = true;
        self.mirror();
    }

    /// Sends the whole map to the shared tier. On failure nothing local
    /// changes; the caller shows [`StoreError::notice`].
    pub fn save(&mut self, actor: &Actor) -> Result<SaveReport, StoreError> {
        let request = SavePositionsRequest {
            positions: self.positions.clone(),
        };
        let report = self.shared.replace(actor, &request)?;
        self.dirty = false;
        tracing::info!(
            actor = %actor.name,
            saved = request.positions.len(),
            history = report.entries.len(),
            "positions saved"
        );
        Ok(report)
    }

    /// Re-reads the shared copy, discarding unsaved local changes.
    pub fn reload(&mut self) -> Result<LoadSource, StoreError> {
        let positions = self.shared.fetch()?;
        self.positions = positions;
        self.source = LoadSource::Shared;
        self.dirty = false;
        self.mirror();
        Ok(self.source)
    }

    pub fn history(
        &self,
        actor: &Actor,
        query: &HistoryQuery,
    ) -> Result<Vec<PositionHistoryEntry>, StoreError> {
        self.shared.history(actor, query)
    }

    fn mirror(&mut self) {
        if let Err(err) = self.cache.write(&self.key, &self.positions) {
            tracing::warn!(error = %err, key = %self.key, "failed to mirror positions to local cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> PersonId {
        PersonId::new(value).unwrap()
    }

    fn editor() -> Actor {
        Actor::new("eve", Role::Editor)
    }

    fn store(shared: MemorySharedStore) -> OverrideStore<MemoryCache, MemorySharedStore> {
        OverrideStore::new(MemoryCache::default(), shared, CacheKey::for_variant("tree"))
    }

    #[test]
    fn mount_prefers_shared_copy() {
        let shared = MemorySharedStore::default();
        shared.seed([(id("a"), PositionOverride::new(1.0, 2.0))].into());
        let mut store = store(shared);
        store
            .cache
            .write(&store.key, &[(id("b"), PositionOverride::new(9.0, 9.0))].into())
            .unwrap();
        assert_eq!(store.mount(), LoadSource::Shared);
        assert_eq!(store.positions().len(), 1);
        assert!(store.positions().contains_key("a"));
        assert!(!store.is_dirty());
    }

    #[test]
    fn mount_falls_back_to_cache_when_shared_fails() {
        let shared = MemorySharedStore::default();
        shared.set_available(false);
        let mut store = store(shared);
        store
            .cache
            .write(&store.key, &[(id("b"), PositionOverride::new(9.0, 9.0))].into())
            .unwrap();
        assert_eq!(store.mount(), LoadSource::Cache);
        assert_eq!(store.positions()[&id("b")], PositionOverride::new(9.0, 9.0));
    }

    #[test]
    fn mount_without_any_copy_is_empty() {
        let shared = MemorySharedStore::default();
        shared.set_available(false);
        let mut store = store(shared);
        assert_eq!(store.mount(), LoadSource::Empty);
        assert!(store.positions().is_empty());
    }

    #[test]
    fn peek_reads_shared_without_overwriting_the_cache() {
        let shared = MemorySharedStore::default();
        shared.seed([(id("a"), PositionOverride::new(1.0, 2.0))].into());
        let mut store = store(shared);
        store
            .cache
            .write(&store.key, &[(id("b"), PositionOverride::new(9.0, 9.0))].into())
            .unwrap();
        assert_eq!(store.peek(), LoadSource::Shared);
        assert!(store.positions().contains_key("a"));
        let cached = store.cache.read(&store.key).unwrap().unwrap();
        assert_eq!(cached.keys().collect::<Vec<_>>(), vec![&id("b")]);
    }

    #[test]
    fn open_session_starts_from_shared_copy_without_a_cache() {
        let shared = MemorySharedStore::default();
        shared.seed([(id("a"), PositionOverride::new(1.0, 2.0))].into());
        let mut fresh = store(shared.clone());
        assert_eq!(fresh.open_session(), LoadSource::Shared);
        fresh.drag_to(id("d"), 5.0, 5.0).unwrap();
        fresh.save(&editor()).unwrap();
        assert_eq!(shared.fetch().unwrap().len(), 2);

        let mut resumed = store(shared);
        resumed
            .cache
            .write(&resumed.key, &[(id("z"), PositionOverride::new(3.0, 3.0))].into())
            .unwrap();
        assert_eq!(resumed.open_session(), LoadSource::Cache);
        assert!(resumed.positions().contains_key("z"));
    }

    #[test]
    fn drag_mirrors_to_cache_without_touching_shared() {
        let mut store = store(MemorySharedStore::default());
        store.drag_to(id("c"), 10.0, 20.0).unwrap();
        store.drag_to(id("c"), 11.0, 21.0).unwrap();
        let cached = store.cache.read(&store.key).unwrap().unwrap();
        assert_eq!(cached[&id("c")], PositionOverride::new(11.0, 21.0));
        assert!(store.shared.fetch().unwrap().is_empty());
        assert!(store.is_dirty());
    }

    #[test]
    fn drag_rejects_non_finite_points() {
        let mut store = store(MemorySharedStore::default());
        let err = store.drag_to(id("c"), f32::NAN, 0.0).unwrap_err();
        assert_eq!(err.notice().kind, NoticeKind::Invalid);
        assert!(store.positions().is_empty());
    }

    #[test]
    fn failed_save_keeps_local_state() {
        let shared = MemorySharedStore::default();
        let mut store = store(shared.clone());
        store.drag_to(id("c"), 500.0, 500.0).unwrap();
        shared.set_available(false);
        let err = store.save(&editor()).unwrap_err();
        assert_eq!(err.notice().kind, NoticeKind::TryAgain);
        assert!(store.is_dirty());
        assert_eq!(store.positions()[&id("c")], PositionOverride::new(500.0, 500.0));
        shared.set_available(true);
        store.save(&editor()).unwrap();
        assert_eq!(shared.fetch().unwrap()[&id("c")], PositionOverride::new(500.0, 500.0));
    }

    #[test]
    fn viewer_cannot_save_and_is_told_so() {
        let mut store = store(MemorySharedStore::default());
        store.drag_to(id("c"), 1.0, 1.0).unwrap();
        let err = store.save(&Actor::new("vic", Role::Viewer)).unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.notice().kind, NoticeKind::NotAllowed);
    }

    #[test]
    fn remove_and_clear_drop_overrides() {
        let mut store = store(MemorySharedStore::default());
        store.drag_to(id("a"), 1.0, 1.0).unwrap();
        store.drag_to(id("b"), 2.0, 2.0).unwrap();
        assert!(store.remove(&id("a")).is_some());
        assert!(store.remove(&id("a")).is_none());
        store.clear();
        assert!(store.cache.read(&store.key).unwrap().unwrap().is_empty());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert!("owner".parse::<Role>().is_err());
        assert!(Role::Editor.can_save());
        assert!(!Role::Editor.can_read_history());
    }
}
