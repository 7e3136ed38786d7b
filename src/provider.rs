//! A store together with its last-known snapshot.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::diff::{self, ChangeSet};
use crate::error::LivefigError;
use crate::flatten::Flattened;
use crate::path;
use crate::snapshot::{FlatEntry, Snapshot};
use crate::store::ConfigurationStore;

/// Wraps one [`ConfigurationStore`] and caches everything it holds.
///
/// Loads, saves and deletes go through one mutex around the cached
/// snapshot, so operations against the same store are linearized while
/// different stores proceed independently. A failed write leaves the cached
/// snapshot untouched.
pub struct StoreProvider {
    store: Box<dyn ConfigurationStore>,
    data: Mutex<Snapshot>,
}

impl std::fmt::Debug for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreProvider")
            .field("store", &self.store.name())
            .field("keys", &self.lock().len())
            .finish()
    }
}

impl StoreProvider {
    /// Wrap `store` with an empty cache; call [`load`](Self::load) to fill it.
    pub fn new(store: Box<dyn ConfigurationStore>) -> Self {
        Self {
            store,
            data: Mutex::new(Snapshot::new()),
        }
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn is_writable(&self) -> bool {
        self.store.is_writable()
    }

    pub fn store(&self) -> &dyn ConfigurationStore {
        self.store.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-read the whole store. Returns whether anything differs from the
    /// cached snapshot.
    pub fn load(&self) -> Result<bool, LivefigError> {
        let mut data = self.lock();
        let fresh = self.store.load_all("")?;
        let changed = !fresh.same_values(&data);
        tracing::debug!(store = self.name(), keys = fresh.len(), changed, "loaded store");
        *data = fresh;
        Ok(changed)
    }

    /// Cached entries at or beneath `section`.
    pub fn section(&self, section: &str) -> Snapshot {
        self.lock().section(section)
    }

    /// Whether the cached snapshot holds anything under `section`.
    pub fn has_prefix(&self, section: &str) -> bool {
        self.lock().has_prefix(section)
    }

    /// The change-set that would move `section` to `candidate`.
    pub fn plan(&self, section: &str, candidate: &Snapshot) -> ChangeSet {
        diff::diff(&self.lock().section(section), candidate)
    }

    /// Persist a flattened section. Paths the flattener skipped are left as
    /// stored. Returns `false` when nothing differed.
    pub fn save(&self, section: &str, candidate: &Flattened) -> Result<bool, LivefigError> {
        let mut data = self.lock();
        let mut previous = data.section(section);
        previous.retain(|e| !candidate.skipped.iter().any(|s| path::is_within(&e.path, s)));

        let changes = diff::diff(&previous, &candidate.snapshot);
        self.commit(&mut data, section, &changes)
    }

    /// Remove every entry at or beneath `section`.
    pub fn delete(&self, section: &str) -> Result<bool, LivefigError> {
        let mut data = self.lock();
        let changes = ChangeSet::delete_all(&data.section(section));
        self.commit(&mut data, section, &changes)
    }

    /// Write a single raw value. `None` clears the entry.
    pub fn set(&self, key: &str, value: Option<String>) -> Result<bool, LivefigError> {
        let mut data = self.lock();
        let previous: Snapshot = data.get(key).cloned().into_iter().collect();
        let candidate: Snapshot = std::iter::once(FlatEntry::new(key, value)).collect();
        let changes = diff::diff(&previous, &candidate);
        self.commit(&mut data, key, &changes)
    }

    fn commit(
        &self,
        data: &mut Snapshot,
        section: &str,
        changes: &ChangeSet,
    ) -> Result<bool, LivefigError> {
        if changes.is_empty() {
            tracing::debug!(store = self.name(), section, "nothing to persist");
            return Ok(false);
        }
        self.store.apply(changes)?;
        *data = self.store.load_all("")?;
        tracing::info!(store = self.name(), section, changes = %changes, "saved section");
        Ok(true)
    }
}
