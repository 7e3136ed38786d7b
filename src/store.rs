//! The contract every backing store implements, and seeding on top of it.
//!
//! A store holds flat entries keyed case-insensitively by path and hands out
//! a stable identifier for each entry it persists. The core relies on four
//! guarantees only:
//!
//! - `apply` commits a whole [`ChangeSet`] or nothing;
//! - identifiers survive updates to the same entry;
//! - `has_prefix` answers section ownership on segment boundaries;
//! - `load_all` returns the latest committed state.

use std::collections::BTreeSet;

use crate::diff::{ChangeSet, Insert};
use crate::error::LivefigError;
use crate::path;
use crate::snapshot::Snapshot;
use crate::types::SeedStrategy;

pub trait ConfigurationStore: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Every entry at or beneath `section`, with identifiers. An empty
    /// section reads the whole store.
    fn load_all(&self, section: &str) -> Result<Snapshot, LivefigError>;

    /// Commit all operations atomically. Readers never observe a partial
    /// application.
    fn apply(&self, changes: &ChangeSet) -> Result<(), LivefigError>;

    /// Whether the store holds anything at or beneath `section`.
    fn has_prefix(&self, section: &str) -> Result<bool, LivefigError> {
        Ok(!self.load_all(section)?.is_empty())
    }

    /// Read-only sources are never chosen as a save target.
    fn is_writable(&self) -> bool {
        true
    }
}

/// Populate `store` from `seed` according to `strategy`. Returns how many
/// entries were inserted.
pub fn seed(
    store: &dyn ConfigurationStore,
    seed: &Snapshot,
    strategy: SeedStrategy,
) -> Result<usize, LivefigError> {
    if strategy == SeedStrategy::None || seed.is_empty() {
        return Ok(0);
    }
    if !store.is_writable() {
        return Err(LivefigError::ReadOnlyStore {
            store: store.name().to_string(),
        });
    }

    let inserts: Vec<Insert> = match strategy {
        SeedStrategy::None => Vec::new(),
        SeedStrategy::InsertIfNotExists => {
            let existing = store.load_all("")?;
            seed.iter()
                .filter(|e| !existing.contains(&e.path))
                .filter_map(to_insert)
                .collect()
        }
        SeedStrategy::Initialize => {
            let sections: BTreeSet<String> =
                seed.paths().map(|p| path::key_of(path::root_segment(p))).collect();
            let mut empty = Vec::new();
            for section in sections {
                if !store.has_prefix(&section)? {
                    empty.push(section);
                }
            }
            seed.iter()
                .filter(|e| empty.iter().any(|s| path::is_within(&e.path, s)))
                .filter_map(to_insert)
                .collect()
        }
    };

    let count = inserts.len();
    if count > 0 {
        store.apply(&ChangeSet {
            to_insert: inserts,
            ..ChangeSet::default()
        })?;
    }
    tracing::debug!(store = store.name(), ?strategy, inserted = count, "seeded store");
    Ok(count)
}

fn to_insert(entry: &crate::snapshot::FlatEntry) -> Option<Insert> {
    entry.value.as_ref().map(|value| Insert {
        path: entry.path.clone(),
        value: value.clone(),
    })
}
