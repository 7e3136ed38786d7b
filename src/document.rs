//! Document store: a JSON collection of `{ id, key, value }` documents kept
//! in a single file.
//!
//! Every read goes to the file, so changes written by another process show up
//! on the next load. Writes replace the file through a temporary sibling and
//! a rename, which keeps a commit all-or-nothing for readers.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::diff::ChangeSet;
use crate::error::LivefigError;
use crate::memory::apply_changes;
use crate::settings::StoreSettings;
use crate::snapshot::{FlatEntry, Snapshot, StoreId};
use crate::store::ConfigurationStore;

const STORE: &str = "document";

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    id: String,
    key: String,
    value: Option<String>,
}

pub struct DocumentStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl DocumentStore {
    pub fn open(path: &Path, settings: &StoreSettings) -> Result<Self, LivefigError> {
        let store = Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        };
        if !path.exists() {
            if !settings.create_if_not_exists {
                return Err(LivefigError::store(
                    STORE,
                    format!("collection {} does not exist", path.display()),
                ));
            }
            store.write(&Snapshot::new())?;
        }
        // Fail early on an unreadable collection.
        store.read()?;
        tracing::debug!(path = %path.display(), "opened document store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Snapshot, LivefigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::new()),
            Err(e) => {
                return Err(LivefigError::store(
                    STORE,
                    format!("{}: {e}", self.path.display()),
                ));
            }
        };
        if content.trim().is_empty() {
            return Ok(Snapshot::new());
        }
        let docs: Vec<Document> = serde_json::from_str(&content).map_err(|e| {
            LivefigError::store(STORE, format!("{}: {e}", self.path.display()))
        })?;
        Ok(docs
            .into_iter()
            .map(|d| FlatEntry::new(d.key, d.value).with_id(StoreId::new(d.id)))
            .collect())
    }

    fn write(&self, snapshot: &Snapshot) -> Result<(), LivefigError> {
        let docs: Vec<Document> = snapshot
            .iter()
            .map(|e| Document {
                id: e
                    .id
                    .as_ref()
                    .map(|id| id.as_str().to_string())
                    .unwrap_or_else(|| StoreId::generate().to_string()),
                key: e.path.clone(),
                value: e.value.clone(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&docs)
            .map_err(|e| LivefigError::store(STORE, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LivefigError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        replace_file(&tmp, &self.path, json.as_bytes()).map_err(|e| {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %tmp.display(), error = %cleanup, "left temporary file behind");
                }
            }
            LivefigError::store(STORE, format!("{}: {e}", self.path.display()))
        })
    }
}

/// Write `content` to `tmp`, flush it to disk, then move it over `target`.
fn replace_file(tmp: &Path, target: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(tmp)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(tmp, target)
}

impl ConfigurationStore for DocumentStore {
    fn name(&self) -> &str {
        STORE
    }

    fn load_all(&self, section: &str) -> Result<Snapshot, LivefigError> {
        let snapshot = self.read()?.section(section);
        tracing::debug!(section, keys = snapshot.len(), "loaded document section");
        Ok(snapshot)
    }

    fn apply(&self, changes: &ChangeSet) -> Result<(), LivefigError> {
        if changes.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let next = apply_changes(STORE, &self.read()?, changes)?;
        self.write(&next)?;
        tracing::debug!(changes = %changes, "committed document change-set");
        Ok(())
    }

    fn has_prefix(&self, section: &str) -> Result<bool, LivefigError> {
        Ok(self.read()?.has_prefix(section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff;
    use std::fs;

    fn open(dir: &tempfile::TempDir) -> DocumentStore {
        DocumentStore::open(&dir.path().join("options.json"), &StoreSettings::default()).unwrap()
    }

    #[test]
    fn creates_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert_eq!(fs::read_to_string(store.path()).unwrap().trim(), "[]");
        assert!(store.load_all("").unwrap().is_empty());
    }

    #[test]
    fn committed_changes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store
            .apply(&ChangeSet::insert_all(&Snapshot::from_pairs([
                ("db:host", Some("h")),
                ("db:port", Some("5432")),
            ])))
            .unwrap();

        let reopened = open(&dir);
        let db = reopened.load_all("db").unwrap();
        assert_eq!(db.value("db:port"), Some(Some("5432")));
        assert!(db.iter().all(|e| e.id.is_some()));
        assert!(!dir.path().join("options.json.tmp").exists());
    }

    #[test]
    fn failed_replace_removes_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        // A non-empty directory where the collection should be: rename fails.
        fs::remove_file(store.path()).unwrap();
        fs::create_dir(store.path()).unwrap();
        fs::write(store.path().join("blocker"), "x").unwrap();

        let err = store
            .write(&Snapshot::from_pairs([("db:port", Some("1"))]))
            .unwrap_err();
        assert!(matches!(err, LivefigError::StoreUnavailable { .. }));
        assert!(!dir.path().join("options.json.tmp").exists());
    }

    #[test]
    fn ids_survive_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store
            .apply(&ChangeSet::insert_all(&Snapshot::from_pairs([("db:port", Some("1"))])))
            .unwrap();
        let before = store.load_all("db").unwrap();
        store
            .apply(&diff::diff(&before, &Snapshot::from_pairs([("db:port", Some("2"))])))
            .unwrap();
        let after = store.load_all("db").unwrap();
        assert_eq!(after.get("db:port").unwrap().id, before.get("db:port").unwrap().id);
    }

    #[test]
    fn sees_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        fs::write(
            store.path(),
            r#"[{"id": "a1", "key": "Feature:Enabled", "value": "true"}]"#,
        )
        .unwrap();
        assert!(store.has_prefix("feature").unwrap());
        let entry = store.load_all("feature").unwrap();
        assert_eq!(entry.get("feature:enabled").unwrap().id, Some(StoreId::new("a1")));
    }

    #[test]
    fn corrupt_collection_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, "{ not json").unwrap();
        let err = DocumentStore::open(&path, &StoreSettings::default()).err().unwrap();
        assert!(matches!(err, LivefigError::StoreUnavailable { .. }));
    }

    #[test]
    fn missing_collection_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            create_if_not_exists: false,
            ..StoreSettings::default()
        };
        assert!(DocumentStore::open(&dir.path().join("none.json"), &settings).is_err());
    }
}
