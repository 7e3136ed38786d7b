//! Change-set computation between a stored snapshot and a candidate.
//!
//! This is the only place deltas are computed. It is pure: stores apply the
//! result, nothing here touches I/O.

use std::fmt;

use crate::snapshot::{Snapshot, StoreId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    pub path: String,
    pub value: String,
}

/// A new value for an entry the store already holds. `path` is carried for
/// logging and for stores that address rows by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub path: String,
    pub id: StoreId,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub path: String,
    pub id: StoreId,
}

/// The minimal operations that move a store from one snapshot to another.
/// Every path appears in at most one list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub to_delete: Vec<Delete>,
    pub to_insert: Vec<Insert>,
    pub to_update: Vec<Update>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_insert.is_empty() && self.to_update.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_delete.len() + self.to_insert.len() + self.to_update.len()
    }

    /// Delete every entry of `snapshot` that carries an identifier.
    pub fn delete_all(snapshot: &Snapshot) -> ChangeSet {
        ChangeSet {
            to_delete: snapshot
                .iter()
                .filter_map(|e| {
                    e.id.clone().map(|id| Delete {
                        path: e.path.clone(),
                        id,
                    })
                })
                .collect(),
            ..ChangeSet::default()
        }
    }

    /// Insert every non-null entry of `snapshot`.
    pub fn insert_all(snapshot: &Snapshot) -> ChangeSet {
        ChangeSet {
            to_insert: snapshot
                .iter()
                .filter_map(|e| {
                    e.value.clone().map(|value| Insert {
                        path: e.path.clone(),
                        value,
                    })
                })
                .collect(),
            ..ChangeSet::default()
        }
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} delete(s), {} insert(s), {} update(s)",
            self.to_delete.len(),
            self.to_insert.len(),
            self.to_update.len()
        )
    }
}

/// Reconcile `previous` (as stored, with identifiers) against `candidate`.
///
/// - in `previous` only: delete;
/// - in `candidate` only with a value: insert (a null there has nothing to
///   clear and is skipped);
/// - in both: equal values are a no-op, a null over a value is a delete,
///   anything else an update carrying the stored identifier.
///
/// Paths compare case-insensitively, values ordinally. An entry of
/// `previous` without an identifier was never persisted by the target
/// store; it cannot be deleted, and a change to it becomes an insert.
pub fn diff(previous: &Snapshot, candidate: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for old in previous {
        if !candidate.contains(&old.path) {
            if let Some(id) = &old.id {
                changes.to_delete.push(Delete {
                    path: old.path.clone(),
                    id: id.clone(),
                });
            }
        }
    }

    for new in candidate {
        let Some(old) = previous.get(&new.path) else {
            if let Some(value) = &new.value {
                changes.to_insert.push(Insert {
                    path: new.path.clone(),
                    value: value.clone(),
                });
            }
            continue;
        };

        if old.value == new.value {
            continue;
        }

        match (&old.id, &new.value) {
            (Some(id), None) => changes.to_delete.push(Delete {
                path: old.path.clone(),
                id: id.clone(),
            }),
            (Some(id), value) => changes.to_update.push(Update {
                path: old.path.clone(),
                id: id.clone(),
                value: value.clone(),
            }),
            (None, Some(value)) => changes.to_insert.push(Insert {
                path: new.path.clone(),
                value: value.clone(),
            }),
            (None, None) => {}
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FlatEntry;

    fn stored(entries: &[(&str, Option<&str>, &str)]) -> Snapshot {
        entries
            .iter()
            .map(|(p, v, id)| FlatEntry::new(*p, v.map(String::from)).with_id(StoreId::new(*id)))
            .collect()
    }

    fn candidate(pairs: &[(&str, Option<&str>)]) -> Snapshot {
        Snapshot::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn single_changed_port_is_one_update() {
        let previous = stored(&[
            ("db:host", Some("localhost"), "1"),
            ("db:port", Some("5432"), "2"),
        ]);
        let next = candidate(&[("db:host", Some("localhost")), ("db:port", Some("5433"))]);
        let changes = diff(&previous, &next);
        assert!(changes.to_insert.is_empty());
        assert!(changes.to_delete.is_empty());
        assert_eq!(
            changes.to_update,
            vec![Update {
                path: "db:port".into(),
                id: StoreId::new("2"),
                value: Some("5433".into()),
            }]
        );
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let previous = stored(&[("a", Some("1"), "x"), ("b", None, "y")]);
        let changes = diff(&previous, &previous.without_ids());
        assert!(changes.is_empty());
        assert_eq!(changes.len(), 0);
    }

    #[test]
    fn removed_path_is_deleted_with_its_id() {
        let previous = stored(&[("s:tags:0", Some("a"), "1"), ("s:tags:1", Some("b"), "2")]);
        let changes = diff(&previous, &candidate(&[("s:tags:0", Some("a"))]));
        assert_eq!(
            changes.to_delete,
            vec![Delete {
                path: "s:tags:1".into(),
                id: StoreId::new("2"),
            }]
        );
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn new_path_is_inserted() {
        let changes = diff(&Snapshot::new(), &candidate(&[("db:host", Some("h"))]));
        assert_eq!(
            changes.to_insert,
            vec![Insert {
                path: "db:host".into(),
                value: "h".into(),
            }]
        );
    }

    #[test]
    fn null_over_value_deletes() {
        let previous = stored(&[("tls:cert", Some("a.pem"), "7")]);
        let changes = diff(&previous, &candidate(&[("tls:cert", None)]));
        assert_eq!(changes.to_delete.len(), 1);
        assert_eq!(changes.to_delete[0].id, StoreId::new("7"));
        assert!(changes.to_update.is_empty());
    }

    #[test]
    fn null_over_absent_is_noop() {
        let changes = diff(&Snapshot::new(), &candidate(&[("tls:cert", None)]));
        assert!(changes.is_empty());
    }

    #[test]
    fn null_and_absent_diff_differently() {
        let previous = stored(&[("tls:cert", Some("a.pem"), "7"), ("tls:key", Some("k"), "8")]);
        // Explicit null deletes the stored value; the untouched key is kept
        // only if the candidate still carries it.
        let explicit = diff(&previous, &candidate(&[("tls:cert", None), ("tls:key", Some("k"))]));
        assert_eq!(explicit.to_delete.len(), 1);

        let never_set = diff(&Snapshot::new(), &candidate(&[("tls:cert", None)]));
        assert!(never_set.is_empty());
    }

    #[test]
    fn value_over_null_updates() {
        let previous = stored(&[("tls:cert", None, "7")]);
        let changes = diff(&previous, &candidate(&[("tls:cert", Some("b.pem"))]));
        assert_eq!(changes.to_update.len(), 1);
        assert_eq!(changes.to_update[0].value.as_deref(), Some("b.pem"));
    }

    #[test]
    fn paths_compare_case_insensitively_values_ordinally() {
        let previous = stored(&[("DB:Host", Some("Localhost"), "1")]);
        let changes = diff(&previous, &candidate(&[("db:host", Some("localhost"))]));
        assert!(changes.to_insert.is_empty());
        assert_eq!(changes.to_update.len(), 1);
        assert_eq!(changes.to_update[0].path, "DB:Host");
    }

    #[test]
    fn unpersisted_previous_entries_insert_instead() {
        let previous = candidate(&[("a", Some("1")), ("b", Some("2"))]);
        let changes = diff(&previous, &candidate(&[("a", Some("9"))]));
        assert!(changes.to_delete.is_empty());
        assert!(changes.to_update.is_empty());
        assert_eq!(changes.to_insert.len(), 1);
    }

    #[test]
    fn each_path_appears_once() {
        let previous = stored(&[
            ("a", Some("1"), "1"),
            ("b", Some("2"), "2"),
            ("c", Some("3"), "3"),
        ]);
        let next = candidate(&[("a", Some("1")), ("b", None), ("c", Some("4")), ("d", Some("5"))]);
        let changes = diff(&previous, &next);
        let mut paths: Vec<&str> = changes
            .to_delete
            .iter()
            .map(|d| d.path.as_str())
            .chain(changes.to_insert.iter().map(|i| i.path.as_str()))
            .chain(changes.to_update.iter().map(|u| u.path.as_str()))
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["b", "c", "d"]);
    }

    #[test]
    fn bulk_helpers() {
        let previous = stored(&[("a", Some("1"), "1"), ("b", None, "2")]);
        assert_eq!(ChangeSet::delete_all(&previous).to_delete.len(), 2);
        assert_eq!(ChangeSet::insert_all(&previous).to_insert.len(), 1);
        assert_eq!(
            ChangeSet::delete_all(&previous).to_string(),
            "2 delete(s), 0 insert(s), 0 update(s)"
        );
    }
}
