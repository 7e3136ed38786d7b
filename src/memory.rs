//! In-process store, for tests and for applications that only need live
//! options for the lifetime of the process.

use std::sync::{PoisonError, RwLock};

use crate::diff::ChangeSet;
use crate::error::LivefigError;
use crate::snapshot::{FlatEntry, Snapshot, StoreId};
use crate::store::ConfigurationStore;

#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    entries: RwLock<Snapshot>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Snapshot::new()),
        }
    }

    /// A store pre-filled with `(path, value)` pairs, each given a fresh id.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        let entries = Snapshot::from_pairs(pairs)
            .into_iter()
            .map(|e| e.with_id(StoreId::generate()))
            .collect();
        *store.entries.write().unwrap_or_else(PoisonError::into_inner) = entries;
        store
    }
}

impl ConfigurationStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_all(&self, section: &str) -> Result<Snapshot, LivefigError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.section(section))
    }

    fn apply(&self, changes: &ChangeSet) -> Result<(), LivefigError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *entries = apply_changes(&self.name, &entries, changes)?;
        Ok(())
    }

    fn has_prefix(&self, section: &str) -> Result<bool, LivefigError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.has_prefix(section))
    }
}

/// Apply `changes` to a copy of `current`, giving inserted entries fresh ids.
/// Fails without side effects on an unknown id or a duplicate key.
pub(crate) fn apply_changes(
    store: &str,
    current: &Snapshot,
    changes: &ChangeSet,
) -> Result<Snapshot, LivefigError> {
    let mut next = current.clone();

    for delete in &changes.to_delete {
        let path = path_of(&next, &delete.id)
            .ok_or_else(|| LivefigError::store(store, format!("no entry with id {}", delete.id)))?;
        next.remove(&path);
    }
    for update in &changes.to_update {
        let path = path_of(&next, &update.id)
            .ok_or_else(|| LivefigError::store(store, format!("no entry with id {}", update.id)))?;
        next.insert(FlatEntry::new(path, update.value.clone()).with_id(update.id.clone()));
    }
    for insert in &changes.to_insert {
        if next.contains(&insert.path) {
            return Err(LivefigError::store(
                store,
                format!("duplicate key '{}'", insert.path),
            ));
        }
        next.insert(
            FlatEntry::new(insert.path.clone(), Some(insert.value.clone()))
                .with_id(StoreId::generate()),
        );
    }
    Ok(next)
}

fn path_of(entries: &Snapshot, id: &StoreId) -> Option<String> {
    entries
        .iter()
        .find(|e| e.id.as_ref() == Some(id))
        .map(|e| e.path.clone())
}
