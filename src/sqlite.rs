//! Relational file store backed by SQLite.
//!
//! One table holds every entry:
//!
//! ```sql
//! configuration(id TEXT PRIMARY KEY, key TEXT NOT NULL UNIQUE COLLATE NOCASE, value TEXT)
//! ```
//!
//! A change-set is applied inside one transaction, so a failure anywhere rolls
//! the whole set back.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};

use crate::diff::ChangeSet;
use crate::error::LivefigError;
use crate::settings::StoreSettings;
use crate::snapshot::{FlatEntry, Snapshot, StoreId};
use crate::store::ConfigurationStore;

const STORE: &str = "sqlite";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database file at `path`.
    ///
    /// With `create_if_not_exists` off a missing file is an error. With
    /// `migrate_on_startup` off the schema is assumed to exist already.
    pub fn open(path: &Path, settings: &StoreSettings) -> Result<Self, LivefigError> {
        if !settings.create_if_not_exists && !path.exists() {
            return Err(LivefigError::store(
                STORE,
                format!("database {} does not exist", path.display()),
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LivefigError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path).map_err(|e| LivefigError::store(STORE, e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        if settings.migrate_on_startup {
            store.init_schema()?;
        }
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(store)
    }

    /// Opens an in-memory database with the schema in place.
    pub fn open_in_memory() -> Result<Self, LivefigError> {
        let conn = Connection::open_in_memory().map_err(|e| LivefigError::store(STORE, e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), LivefigError> {
        self.lock()
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS configuration (
                    id TEXT PRIMARY KEY,
                    key TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    value TEXT
                );
                ",
            )
            .map_err(|e| LivefigError::store(STORE, format!("failed to migrate schema: {e}")))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// LIKE pattern matching everything strictly beneath `section`.
fn below_pattern(section: &str) -> String {
    let escaped = section
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}:%")
}

impl ConfigurationStore for SqliteStore {
    fn name(&self) -> &str {
        STORE
    }

    fn load_all(&self, section: &str) -> Result<Snapshot, LivefigError> {
        let conn = self.lock();
        let (sql, args): (&str, Vec<String>) = if section.is_empty() {
            ("SELECT id, key, value FROM configuration ORDER BY rowid", Vec::new())
        } else {
            (
                "SELECT id, key, value FROM configuration
                 WHERE key = ?1 OR key LIKE ?2 ESCAPE '\\'
                 ORDER BY rowid",
                vec![section.to_string(), below_pattern(section)],
            )
        };

        let mut stmt = conn.prepare(sql).map_err(|e| LivefigError::store(STORE, e))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                let id: String = row.get(0)?;
                let key: String = row.get(1)?;
                let value: Option<String> = row.get(2)?;
                Ok(FlatEntry::new(key, value).with_id(StoreId::new(id)))
            })
            .map_err(|e| LivefigError::store(STORE, e))?;

        let snapshot = rows
            .collect::<Result<Snapshot, _>>()
            .map_err(|e| LivefigError::store(STORE, e))?;
        tracing::debug!(section, keys = snapshot.len(), "loaded sqlite section");
        Ok(snapshot)
    }

    fn apply(&self, changes: &ChangeSet) -> Result<(), LivefigError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(|e| LivefigError::store(STORE, e))?;

        for delete in &changes.to_delete {
            let affected = tx
                .execute("DELETE FROM configuration WHERE id = ?1", params![delete.id.as_str()])
                .map_err(|e| LivefigError::store(STORE, e))?;
            if affected != 1 {
                return Err(LivefigError::store(
                    STORE,
                    format!("no entry with id {} for '{}'", delete.id, delete.path),
                ));
            }
        }
        for update in &changes.to_update {
            let affected = tx
                .execute(
                    "UPDATE configuration SET value = ?2 WHERE id = ?1",
                    params![update.id.as_str(), update.value],
                )
                .map_err(|e| LivefigError::store(STORE, e))?;
            if affected != 1 {
                return Err(LivefigError::store(
                    STORE,
                    format!("no entry with id {} for '{}'", update.id, update.path),
                ));
            }
        }
        for insert in &changes.to_insert {
            tx.execute(
                "INSERT INTO configuration (id, key, value) VALUES (?1, ?2, ?3)",
                params![StoreId::generate().as_str(), insert.path, insert.value],
            )
            .map_err(|e| LivefigError::store(STORE, format!("insert '{}': {e}", insert.path)))?;
        }

        tx.commit().map_err(|e| LivefigError::store(STORE, e))?;
        tracing::debug!(changes = %changes, "committed sqlite change-set");
        Ok(())
    }

    fn has_prefix(&self, section: &str) -> Result<bool, LivefigError> {
        let conn = self.lock();
        let found = if section.is_empty() {
            conn.query_row("SELECT 1 FROM configuration LIMIT 1", [], |_| Ok(()))
                .optional()
        } else {
            conn.query_row(
                "SELECT 1 FROM configuration WHERE key = ?1 OR key LIKE ?2 ESCAPE '\\' LIMIT 1",
                params![section, below_pattern(section)],
                |_| Ok(()),
            )
            .optional()
        };
        found
            .map(|row| row.is_some())
            .map_err(|e| LivefigError::store(STORE, e))
    }
}
