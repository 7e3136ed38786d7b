use std::path::PathBuf;
use thiserror::Error;

use crate::validate::ValidationErrors;

#[derive(Debug, Error)]
pub enum LivefigError {
    #[error("Cannot flatten '{path}': {reason}")]
    UnsupportedShape { path: String, reason: String },

    #[error("Store '{store}' is unavailable: {reason}")]
    StoreUnavailable { store: String, reason: String },

    #[error("Store '{store}' is read-only")]
    ReadOnlyStore { store: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Failed to bind section '{section}': {reason}")]
    BindFailed { section: String, reason: String },

    #[error("Settings error: {0}")]
    SettingsError(#[from] confique::Error),

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Unknown options type '{0}' (register it with .patchable())")]
    UnknownType(String),

    #[error("Invalid patch for '{section}': {reason}")]
    InvalidPatch { section: String, reason: String },

    #[error("App name is required (use .app_name())")]
    AppNameRequired,

    #[error("No data path configured and no platform data directory for '{0}'")]
    DataPathUnavailable(String),
}

impl LivefigError {
    pub(crate) fn store(store: &str, reason: impl ToString) -> Self {
        LivefigError::StoreUnavailable {
            store: store.to_string(),
            reason: reason.to_string(),
        }
    }
}
