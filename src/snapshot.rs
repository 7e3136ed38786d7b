//! Flat snapshots: the path-addressable form of a section.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::LivefigError;
use crate::path;

/// Opaque identifier a store assigns to an entry on first persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        StoreId(id.into())
    }

    /// A fresh random identifier, for stores that assign their own.
    pub fn generate() -> Self {
        StoreId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One flattened key.
///
/// `value: None` means the key is known but explicitly cleared, which is not
/// the same as the entry being absent from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub path: String,
    pub value: Option<String>,
    pub id: Option<StoreId>,
}

impl FlatEntry {
    pub fn new(path: impl Into<String>, value: Option<String>) -> Self {
        Self {
            path: path.into(),
            value,
            id: None,
        }
    }

    pub fn with_id(mut self, id: StoreId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Insertion-ordered mapping from path to entry, keyed case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: IndexMap<String, FlatEntry>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `(path, value)` pairs without identifiers.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| FlatEntry::new(k, v.map(Into::into)))
            .collect()
    }

    /// Flatten a TOML document into `:` paths, e.g. a seed file.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(content)?;
        // A TOML table never holds byte buffers or non-string keys.
        Ok(crate::flatten::flatten(&table, "").unwrap_or_default())
    }

    pub fn from_toml_file(file: &Path) -> Result<Self, LivefigError> {
        let content = std::fs::read_to_string(file).map_err(|e| LivefigError::IoError {
            path: file.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| LivefigError::ParseError {
            path: file.to_path_buf(),
            source: e,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the entry for its path. A replaced entry keeps its
    /// position.
    pub fn insert(&mut self, entry: FlatEntry) -> Option<FlatEntry> {
        self.entries.insert(path::key_of(&entry.path), entry)
    }

    pub fn get(&self, path: &str) -> Option<&FlatEntry> {
        self.entries.get(&path::key_of(path))
    }

    /// `None` when absent, `Some(None)` when explicitly null.
    pub fn value(&self, path: &str) -> Option<Option<&str>> {
        self.get(path).map(|e| e.value.as_deref())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&path::key_of(path))
    }

    pub fn remove(&mut self, path: &str) -> Option<FlatEntry> {
        self.entries.shift_remove(&path::key_of(path))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&FlatEntry) -> bool) {
        self.entries.retain(|_, entry| keep(entry));
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlatEntry> {
        self.entries.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.path.as_str())
    }

    /// Entries that are `section` itself or lie beneath it.
    pub fn section(&self, section: &str) -> Snapshot {
        self.iter()
            .filter(|e| path::is_within(&e.path, section))
            .cloned()
            .collect()
    }

    /// Whether anything is stored at or beneath `section`.
    pub fn has_prefix(&self, section: &str) -> bool {
        self.iter().any(|e| path::is_within(&e.path, section))
    }

    /// Compare paths and values, ignoring order and store identifiers.
    pub fn same_values(&self, other: &Snapshot) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(key, e)| other.entries.get(key).is_some_and(|o| o.value == e.value))
    }

    /// Copy without identifiers, e.g. to seed a different store.
    pub fn without_ids(&self) -> Snapshot {
        self.iter()
            .map(|e| FlatEntry::new(e.path.clone(), e.value.clone()))
            .collect()
    }
}

impl FromIterator<FlatEntry> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FlatEntry>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for entry in iter {
            snapshot.insert(entry);
        }
        snapshot
    }
}

impl IntoIterator for Snapshot {
    type Item = FlatEntry;
    type IntoIter = indexmap::map::IntoValues<String, FlatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a FlatEntry;
    type IntoIter = indexmap::map::Values<'a, String, FlatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
