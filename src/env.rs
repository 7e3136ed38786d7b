//! Read-only layer built from environment variables.

use crate::diff::ChangeSet;
use crate::error::LivefigError;
use crate::path;
use crate::snapshot::{FlatEntry, Snapshot, StoreId};
use crate::store::ConfigurationStore;

/// Entries from environment variables matching `{PREFIX}__*`.
///
/// Double underscore `__` separates path segments, a single `_` stays part of
/// the segment, and segments are lowercased: `MYAPP__DB__POOL_SIZE=10` becomes
/// `db:pool_size = "10"`. Values are kept as strings; binding parses them.
///
/// The variables are captured once, when the source is created.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    entries: Snapshot,
}

impl EnvSource {
    /// Capture the process environment.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Takes an iterator so tests can pass synthetic data instead of `std::env::vars()`.
    pub fn from_vars(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let needle = format!("{prefix}__");
        let mut entries = Snapshot::new();

        for (key, value) in vars {
            let Some(rest) = key.strip_prefix(&needle) else {
                continue;
            };
            if rest.is_empty() || rest.split("__").any(str::is_empty) {
                continue;
            }
            let flat_path = rest
                .split("__")
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(&path::SEPARATOR.to_string());
            let id = StoreId::new(key.clone());
            entries.insert(FlatEntry::new(flat_path, Some(value)).with_id(id));
        }

        Self {
            prefix: prefix.to_string(),
            entries,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl ConfigurationStore for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    fn load_all(&self, section: &str) -> Result<Snapshot, LivefigError> {
        Ok(self.entries.section(section))
    }

    fn apply(&self, _changes: &ChangeSet) -> Result<(), LivefigError> {
        Err(LivefigError::ReadOnlyStore {
            store: self.name().to_string(),
        })
    }

    fn has_prefix(&self, section: &str) -> Result<bool, LivefigError> {
        Ok(self.entries.has_prefix(section))
    }

    fn is_writable(&self) -> bool {
        false
    }
}
