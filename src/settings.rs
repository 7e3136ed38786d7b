//! Settings that control how stores are opened and seeded.

use std::path::{Path, PathBuf};

use confique::Config;

use crate::error::LivefigError;
use crate::types::SeedStrategy;

/// Store settings, loadable from a TOML file.
///
/// ```toml
/// data_path = "/var/lib/myapp/options.db"
/// create_if_not_exists = true
/// migrate_on_startup = true
/// seed_strategy = "insert_if_not_exists"
/// reload_on_change = true
/// ```
#[derive(Config, Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// Store file. When unset, a file in the platform data directory is used.
    #[config(env = "LIVEFIG_DATA_PATH")]
    pub data_path: Option<PathBuf>,

    /// Create the store file when it does not exist yet.
    #[config(default = true)]
    pub create_if_not_exists: bool,

    /// Create or upgrade the store schema when opening.
    #[config(default = true)]
    pub migrate_on_startup: bool,

    /// How seed data is applied when the store is opened.
    #[config(default = "none")]
    pub seed_strategy: SeedStrategy,

    /// Reload providers after every successful write.
    #[config(default = true)]
    pub reload_on_change: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_path: None,
            create_if_not_exists: true,
            migrate_on_startup: true,
            seed_strategy: SeedStrategy::None,
            reload_on_change: true,
        }
    }
}

impl StoreSettings {
    /// Load from `file` (skipped when missing) and the environment, with
    /// defaults for everything else.
    pub fn load(file: Option<&Path>) -> Result<Self, LivefigError> {
        let mut builder = Self::builder().env();
        if let Some(file) = file {
            builder = builder.file(file);
        }
        Ok(builder.load()?)
    }

    /// `data_path` if set, else `file_name` under the platform data
    /// directory for `app_name` (e.g. `~/.local/share/{app_name}/` on Linux).
    pub fn resolve_data_path(&self, app_name: &str, file_name: &str) -> Result<PathBuf, LivefigError> {
        match &self.data_path {
            Some(path) => Ok(path.clone()),
            None => default_data_dir(app_name).map(|dir| dir.join(file_name)),
        }
    }
}

pub fn default_data_dir(app_name: &str) -> Result<PathBuf, LivefigError> {
    directories::ProjectDirs::from("", "", app_name)
        .map(|proj| proj.data_dir().to_path_buf())
        .ok_or_else(|| LivefigError::DataPathUnavailable(app_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_match_derived_defaults() {
        let loaded = StoreSettings::builder().load().unwrap();
        assert_eq!(loaded, StoreSettings::default());
    }

    #[test]
    fn load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("livefig.toml");
        fs::write(
            &file,
            "data_path = \"/tmp/options.db\"\nseed_strategy = \"initialize\"\nreload_on_change = false\n",
        )
        .unwrap();
        let settings = StoreSettings::load(Some(&file)).unwrap();
        assert_eq!(settings.data_path, Some(PathBuf::from("/tmp/options.db")));
        assert_eq!(settings.seed_strategy, SeedStrategy::Initialize);
        assert!(!settings.reload_on_change);
        assert!(settings.create_if_not_exists);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(settings.seed_strategy, SeedStrategy::None);
    }

    #[test]
    fn invalid_value_is_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("livefig.toml");
        fs::write(&file, "seed_strategy = \"sometimes\"\n").unwrap();
        let err = StoreSettings::load(Some(&file)).unwrap_err();
        assert!(matches!(err, LivefigError::SettingsError(_)));
    }

    #[test]
    fn explicit_data_path_wins() {
        let settings = StoreSettings {
            data_path: Some(PathBuf::from("/srv/opts.db")),
            ..StoreSettings::default()
        };
        assert_eq!(
            settings.resolve_data_path("myapp", "options.db").unwrap(),
            PathBuf::from("/srv/opts.db")
        );
    }
}
