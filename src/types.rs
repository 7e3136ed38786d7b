use serde::{Deserialize, Serialize};

/// How a store is pre-populated from seed data when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    /// Never seed.
    #[default]
    None,
    /// Insert seed keys the store does not hold yet; existing values win.
    InsertIfNotExists,
    /// Seed a top-level section only when the store holds nothing under it.
    Initialize,
}

/// Result of a save attempt against the owning stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// At least one store persisted the candidate.
    Ok,
    /// No writable store owns the section; create it with `try_add`.
    NotFound,
    /// A store owns the section but nothing was persisted: the candidate
    /// failed validation or matched what is stored.
    NotModified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    NoContent,
    NotFound,
}

/// An options operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this. Paths use `:`.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsAction {
    List { section: Option<String> },
    Get { path: String },
    Set { path: String, value: String },
    Delete { section: String },
    /// Apply a JSON merge patch to the typed value of `section`, creating
    /// the section when no store holds it yet.
    Patch {
        type_name: String,
        section: String,
        patch: String,
    },
}
