//! Untyped operations over the merged view: listing, key lookup, and the
//! `OptionsResult` callers display.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::LivefigError;
use crate::root::ConfigurationRoot;
use crate::types::{DeleteOutcome, SaveOutcome};

/// Result of an options operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsResult {
    /// A key's merged value; `None` when explicitly cleared.
    KeyValue { path: String, value: Option<String> },
    /// Outcome of writing one key.
    ValueSet {
        path: String,
        value: String,
        outcome: SaveOutcome,
    },
    /// Outcome of deleting a section.
    Deleted { section: String, outcome: DeleteOutcome },
    /// Outcome of patching a typed section.
    Patched {
        section: String,
        outcome: SaveOutcome,
    },
    /// Merged key-value pairs.
    Listing { entries: Vec<(String, Option<String>)> },
}

impl fmt::Display for OptionsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsResult::KeyValue { path, value } => {
                write!(f, "{path} = {}", display_value(value.as_deref()))
            }
            OptionsResult::ValueSet {
                path,
                value,
                outcome,
            } => match outcome {
                SaveOutcome::Ok => write!(f, "Set {path} = {value}"),
                SaveOutcome::NotModified => write!(f, "{path} already {value}"),
                SaveOutcome::NotFound => write!(f, "No writable store for {path}"),
            },
            OptionsResult::Deleted { section, outcome } => match outcome {
                DeleteOutcome::NoContent => write!(f, "Deleted {section}"),
                DeleteOutcome::NotFound => write!(f, "Section {section} not found"),
            },
            OptionsResult::Patched { section, outcome } => match outcome {
                SaveOutcome::Ok => write!(f, "Patched {section}"),
                SaveOutcome::NotModified => write!(f, "{section} unchanged"),
                SaveOutcome::NotFound => write!(f, "No writable store for {section}"),
            },
            OptionsResult::Listing { entries } => {
                for (i, (path, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{path} = {}", display_value(value.as_deref()))?;
                }
                Ok(())
            }
        }
    }
}

fn display_value(value: Option<&str>) -> &str {
    value.unwrap_or("<null>")
}

/// Apply an RFC 7386 JSON merge patch to `target`.
///
/// A `null` member removes the field, or restores it from `defaults` when
/// the defaults document has it.
pub(crate) fn merge_patch(target: &mut Value, patch: &Value, defaults: Option<&Value>) {
    let Value::Object(members) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(fields) = target else {
        return;
    };
    for (key, value) in members {
        let default = defaults.and_then(|d| d.get(key));
        if value.is_null() {
            match default {
                Some(d) => {
                    fields.insert(key.clone(), d.clone());
                }
                None => {
                    fields.remove(key);
                }
            }
        } else {
            merge_patch(fields.entry(key.clone()).or_insert(Value::Null), value, default);
        }
    }
}

/// Look up one key in the merged view.
pub fn get_value(root: &ConfigurationRoot, path: &str) -> Result<OptionsResult, LivefigError> {
    let merged = root.section(path);
    let entry = merged
        .get(path)
        .ok_or_else(|| LivefigError::SectionNotFound(path.to_string()))?;
    Ok(OptionsResult::KeyValue {
        path: entry.path.clone(),
        value: entry.value.clone(),
    })
}

/// All merged entries, or those under `section`, sorted by path.
pub fn list_values(root: &ConfigurationRoot, section: Option<&str>) -> OptionsResult {
    let merged = root.section(section.unwrap_or(""));
    let mut entries: Vec<(String, Option<String>)> = merged
        .into_iter()
        .map(|e| (e.path, e.value))
        .collect();
    entries.sort_by(|a, b| a.0.to_ascii_lowercase().cmp(&b.0.to_ascii_lowercase()));
    OptionsResult::Listing { entries }
}
