use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::BindCache;
use crate::discriminator::TypeRegistry;
use crate::document::DocumentStore;
use crate::env::EnvSource;
use crate::error::LivefigError;
use crate::notify::ChangeNotifier;
use crate::ops::{self, OptionsResult};
use crate::path;
use crate::provider::StoreProvider;
use crate::root::ConfigurationRoot;
use crate::save::SaveCoordinator;
use crate::settings::StoreSettings;
use crate::snapshot::Snapshot;
use crate::sqlite::SqliteStore;
use crate::store::{self, ConfigurationStore};
use crate::types::{DeleteOutcome, OptionsAction, SaveOutcome, SeedStrategy};
use crate::validate::{Options, short_type_name};

type Patcher = Box<
    dyn Fn(&SaveCoordinator, &str, &serde_json::Value) -> Result<SaveOutcome, LivefigError>
        + Send
        + Sync,
>;

/// Entry point for building a livefig options host.
pub struct Livefig;

impl Livefig {
    pub fn builder() -> LivefigBuilder {
        LivefigBuilder::new()
    }
}

enum PendingStore {
    Ready(Box<dyn ConfigurationStore>),
    Sqlite(Option<PathBuf>),
    Document(Option<PathBuf>),
}

enum PendingSeed {
    Snapshot(Snapshot),
    TomlFile(PathBuf),
}

/// Builder for an [`OptionsHost`].
///
/// Stores are listed in **priority-ascending** order: the last store added
/// wins where several hold the same path, and is the first one tried when
/// saving. The environment layer, when enabled, sits above all of them and is
/// read-only.
pub struct LivefigBuilder {
    app_name: Option<String>,
    stores: Vec<PendingStore>,
    env_prefix: Option<String>,
    env_enabled: bool,
    env_vars: Option<Vec<(String, String)>>,
    seed: Option<PendingSeed>,
    settings: StoreSettings,
    registry: TypeRegistry,
    patchers: HashMap<String, Patcher>,
    notifier: Option<ChangeNotifier>,
}

impl LivefigBuilder {
    fn new() -> Self {
        Self {
            app_name: None,
            stores: Vec::new(),
            env_prefix: None,
            env_enabled: true,
            env_vars: None,
            seed: None,
            settings: StoreSettings::default(),
            registry: TypeRegistry::new(),
            patchers: HashMap::new(),
            notifier: None,
        }
    }

    /// Set the application name. This derives sensible defaults:
    /// - store files → `{app_name}.db` / `{app_name}.json` in the platform data directory
    /// - `env_prefix` → `"{APP_NAME}"` (uppercased)
    /// - the change source name reported to the notifier
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Add a store above the ones already added.
    pub fn store<S: ConfigurationStore + 'static>(mut self, store: S) -> Self {
        self.stores.push(PendingStore::Ready(Box::new(store)));
        self
    }

    /// Add a SQLite store. Without a path, `data_path` from the settings is
    /// used, else `{app_name}.db` in the platform data directory. At most one
    /// file-backed store may fall back to `data_path`.
    pub fn sqlite(mut self, path: Option<PathBuf>) -> Self {
        self.stores.push(PendingStore::Sqlite(path));
        self
    }

    /// Add a JSON document store, resolved like [`sqlite`](Self::sqlite)
    /// with a `.json` file name.
    pub fn document(mut self, path: Option<PathBuf>) -> Self {
        self.stores.push(PendingStore::Document(path));
        self
    }

    /// Override the environment variable prefix (default: uppercased `app_name`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Disable the environment layer entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Read the environment layer from `vars` instead of the process
    /// environment.
    pub fn env_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env_vars = Some(vars.into_iter().collect());
        self
    }

    /// Seed data, applied to the top writable store with the settings'
    /// `seed_strategy`.
    pub fn seed(mut self, seed: Snapshot) -> Self {
        self.seed = Some(PendingSeed::Snapshot(seed));
        self
    }

    /// Seed data read from a TOML file at build time.
    pub fn seed_toml_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.seed = Some(PendingSeed::TomlFile(file.into()));
        self
    }

    pub fn settings(mut self, settings: StoreSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Shorthand for setting only the seed strategy.
    pub fn seed_strategy(mut self, strategy: SeedStrategy) -> Self {
        self.settings.seed_strategy = strategy;
        self
    }

    /// Restrict the subtypes a discriminated enum `base` may resolve to.
    pub fn register_subtypes<I, S>(mut self, base: &str, subtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register(base, subtypes);
        self
    }

    /// Register a subtype with its defaults, used for fields it lacks in storage.
    pub fn register_subtype<S>(mut self, base: &str, subtype: &str) -> Self
    where
        S: serde::Serialize + Default,
    {
        self.registry.register_subtype::<S>(base, subtype);
        self
    }

    /// Register struct defaults for instances that have none of their own,
    /// such as list elements.
    pub fn register_defaults<S>(mut self) -> Self
    where
        S: serde::Serialize + Default,
    {
        self.registry.register_defaults::<S>();
        self
    }

    /// Allow `OptionsAction::Patch` to target sections of type `T`, named
    /// by its type name (case-insensitive).
    pub fn patchable<T: Options>(mut self) -> Self {
        let patcher: Patcher = Box::new(
            |saver: &SaveCoordinator, section: &str, patch: &serde_json::Value| {
                saver.try_patch::<T>(section, patch)
            },
        );
        self.patchers
            .insert(short_type_name::<T>().to_lowercase(), patcher);
        self
    }

    /// Share a notifier with other hosts or observers.
    pub fn notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn source_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or("livefig")
    }

    /// Resolve the effective env prefix (None if env disabled).
    fn effective_env_prefix(&self) -> Option<String> {
        if !self.env_enabled {
            return None;
        }
        self.env_prefix
            .clone()
            .or_else(|| self.app_name.as_ref().map(|app| app.to_uppercase()))
    }

    fn store_path(&self, explicit: Option<PathBuf>, extension: &str) -> Result<PathBuf, LivefigError> {
        if let Some(path) = explicit.or_else(|| self.settings.data_path.clone()) {
            return Ok(path);
        }
        let app = self.app_name.as_deref().ok_or(LivefigError::AppNameRequired)?;
        self.settings.resolve_data_path(app, &format!("{app}.{extension}"))
    }

    fn open_stores(&mut self) -> Result<Vec<Box<dyn ConfigurationStore>>, LivefigError> {
        let pending = std::mem::take(&mut self.stores);
        let mut opened: Vec<Box<dyn ConfigurationStore>> = Vec::with_capacity(pending.len());
        let mut files: Vec<PathBuf> = Vec::new();
        for store in pending {
            opened.push(match store {
                PendingStore::Ready(store) => store,
                PendingStore::Sqlite(path) => {
                    let path = self.store_path(path, "db")?;
                    claim_file(&mut files, &path, "sqlite")?;
                    Box::new(SqliteStore::open(&path, &self.settings)?)
                }
                PendingStore::Document(path) => {
                    let path = self.store_path(path, "json")?;
                    claim_file(&mut files, &path, "document")?;
                    Box::new(DocumentStore::open(&path, &self.settings)?)
                }
            });
        }
        Ok(opened)
    }

    fn load_seed(&mut self) -> Result<Option<Snapshot>, LivefigError> {
        match self.seed.take() {
            None => Ok(None),
            Some(PendingSeed::Snapshot(s)) => Ok(Some(s)),
            Some(PendingSeed::TomlFile(file)) => Snapshot::from_toml_file(&file).map(Some),
        }
    }

    /// Open the stores, apply seed data, load everything and return the host.
    pub fn build(mut self) -> Result<OptionsHost, LivefigError> {
        let mut stores = self.open_stores()?;

        if let Some(seed) = self.load_seed()? {
            match stores.iter().rev().find(|s| s.is_writable()) {
                Some(target) => {
                    store::seed(target.as_ref(), &seed, self.settings.seed_strategy)?;
                }
                None => tracing::warn!("seed data given but no writable store to seed"),
            }
        }

        if let Some(prefix) = self.effective_env_prefix() {
            let env = match self.env_vars.take() {
                Some(vars) => EnvSource::from_vars(&prefix, vars),
                None => EnvSource::from_env(&prefix),
            };
            stores.push(Box::new(env));
        }

        let notifier = self.notifier.take().unwrap_or_default();
        let mut root = ConfigurationRoot::new(self.source_name(), notifier);
        for store in stores {
            let provider = StoreProvider::new(store);
            provider.load()?;
            root.add_provider(provider);
        }
        tracing::info!(
            source = root.source(),
            stores = root.providers().len(),
            "options host ready"
        );

        let root = Arc::new(root);
        let registry = Arc::new(self.registry);
        let cache = Arc::new(BindCache::new(Arc::clone(&root), Arc::clone(&registry)));
        let saver = SaveCoordinator::new(
            Arc::clone(&root),
            Arc::clone(&cache),
            self.settings.reload_on_change,
        );
        Ok(OptionsHost {
            root,
            cache,
            saver,
            registry,
            patchers: self.patchers,
        })
    }
}

/// Two file-backed stores never share a file; `data_path` names one file, so
/// it can back only one of them.
fn claim_file(files: &mut Vec<PathBuf>, path: &Path, store: &str) -> Result<(), LivefigError> {
    if files.iter().any(|f| f == path) {
        return Err(LivefigError::store(
            store,
            format!("{} is already used by another store", path.display()),
        ));
    }
    files.push(path.to_path_buf());
    Ok(())
}

/// Live, saveable options over layered stores.
///
/// Section arguments accept `:` or `/` separators.
pub struct OptionsHost {
    root: Arc<ConfigurationRoot>,
    cache: Arc<BindCache>,
    saver: SaveCoordinator,
    registry: Arc<TypeRegistry>,
    patchers: HashMap<String, Patcher>,
}

impl OptionsHost {
    /// The bound `section`, or `None` when it holds nothing beyond defaults.
    pub fn get<T: Options>(&self, section: &str) -> Result<Option<Arc<T>>, LivefigError> {
        self.cache.get(&path::normalize(section))
    }

    /// Like [`get`](Self::get), failing with `ValidationFailed` for an invalid instance.
    pub fn get_valid<T: Options>(&self, section: &str) -> Result<Option<Arc<T>>, LivefigError> {
        self.cache.get_valid(&path::normalize(section))
    }

    pub fn try_save<T, F>(&self, section: &str, mutate: F) -> Result<SaveOutcome, LivefigError>
    where
        T: Options,
        F: FnOnce(&mut T),
    {
        self.saver.try_save(&path::normalize(section), mutate)
    }

    pub fn try_save_value<T: Options>(
        &self,
        section: &str,
        value: T,
    ) -> Result<SaveOutcome, LivefigError> {
        self.saver.try_save_value(&path::normalize(section), value)
    }

    pub fn try_add<T, F>(&self, section: &str, mutate: F) -> Result<bool, LivefigError>
    where
        T: Options,
        F: FnOnce(&mut T),
    {
        self.saver.try_add(&path::normalize(section), mutate)
    }

    pub fn try_delete(&self, section: &str) -> Result<DeleteOutcome, LivefigError> {
        self.saver.try_delete(&path::normalize(section))
    }

    /// Re-read every store and notify subscribers.
    pub fn reload(&self) -> Result<(), LivefigError> {
        self.root.reload()
    }

    /// Re-read every store; notify only if something changed. Call this
    /// periodically to pick up writes from other processes.
    pub fn refresh(&self) -> Result<bool, LivefigError> {
        self.root.refresh()
    }

    pub fn root(&self) -> &ConfigurationRoot {
        &self.root
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        self.root.notifier()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Handle an `OptionsAction` and print the result to stdout.
    pub fn handle_and_print(&self, action: &OptionsAction) -> Result<(), LivefigError> {
        let result = self.handle(action)?;
        println!("{result}");
        Ok(())
    }

    /// Apply a JSON merge patch to `section`, bound as the type registered
    /// under `type_name` with [`LivefigBuilder::patchable`].
    pub fn try_patch(
        &self,
        type_name: &str,
        section: &str,
        patch: &str,
    ) -> Result<SaveOutcome, LivefigError> {
        let section = path::normalize(section);
        let patch: serde_json::Value =
            serde_json::from_str(patch).map_err(|e| LivefigError::InvalidPatch {
                section: section.clone(),
                reason: e.to_string(),
            })?;
        let patcher = self
            .patchers
            .get(&type_name.to_lowercase())
            .ok_or_else(|| LivefigError::UnknownType(type_name.to_string()))?;
        patcher(&self.saver, &section, &patch)
    }

    /// Handle an `OptionsAction` (list / get / set / delete / patch).
    pub fn handle(&self, action: &OptionsAction) -> Result<OptionsResult, LivefigError> {
        match action {
            OptionsAction::List { section } => Ok(ops::list_values(
                &self.root,
                section.as_deref().map(path::normalize).as_deref(),
            )),
            OptionsAction::Get { path: key } => ops::get_value(&self.root, &path::normalize(key)),
            OptionsAction::Set { path: key, value } => {
                let key = path::normalize(key);
                let outcome = self.saver.set_value(&key, Some(value.clone()))?;
                Ok(OptionsResult::ValueSet {
                    path: key,
                    value: value.clone(),
                    outcome,
                })
            }
            OptionsAction::Delete { section } => {
                let section = path::normalize(section);
                let outcome = self.try_delete(&section)?;
                Ok(OptionsResult::Deleted { section, outcome })
            }
            OptionsAction::Patch {
                type_name,
                section,
                patch,
            } => {
                let outcome = self.try_patch(type_name, section, patch)?;
                Ok(OptionsResult::Patched {
                    section: path::normalize(section),
                    outcome,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{CircleShape, DbOptions, Drawing, Shape};
    use crate::memory::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn db_store() -> MemoryStore {
        MemoryStore::from_pairs([("db:host", Some("localhost")), ("db:port", Some("5432"))])
    }

    #[test]
    fn app_name_derives_env_prefix() {
        let builder = Livefig::builder().app_name("myapp");
        assert_eq!(builder.effective_env_prefix(), Some("MYAPP".to_string()));
        assert_eq!(builder.source_name(), "myapp");
    }

    #[test]
    fn override_env_prefix() {
        let builder = Livefig::builder().app_name("myapp").env_prefix("CUSTOM");
        assert_eq!(builder.effective_env_prefix(), Some("CUSTOM".to_string()));
    }

    #[test]
    fn no_env_disables_prefix() {
        let builder = Livefig::builder().app_name("myapp").no_env();
        assert_eq!(builder.effective_env_prefix(), None);
    }

    #[test]
    fn default_store_path_needs_app_name() {
        let result = Livefig::builder().sqlite(None).build();
        assert!(matches!(result, Err(LivefigError::AppNameRequired)));
    }

    #[test]
    fn stores_sharing_data_path_are_rejected() {
        let dir = TempDir::new().unwrap();
        let settings = StoreSettings {
            data_path: Some(dir.path().join("opts.db")),
            ..StoreSettings::default()
        };
        let result = Livefig::builder()
            .no_env()
            .settings(settings)
            .sqlite(None)
            .document(None)
            .build();
        match result {
            Err(LivefigError::StoreUnavailable { store, reason }) => {
                assert_eq!(store, "document");
                assert!(reason.contains("opts.db"), "{reason}");
            }
            Err(other) => panic!("Expected StoreUnavailable, got: {other:?}"),
            Ok(_) => panic!("Expected the shared path to be rejected"),
        }
    }

    #[test]
    fn binds_from_store() {
        let host = Livefig::builder().store(db_store()).build().unwrap();
        let db = host.get::<DbOptions>("db").unwrap().unwrap();
        assert_eq!(
            *db,
            DbOptions {
                host: "localhost".into(),
                port: 5432
            }
        );
    }

    #[test]
    fn env_layer_overrides_stores() {
        let host = Livefig::builder()
            .app_name("myapp")
            .env_vars(vars(&[("MYAPP__DB__PORT", "6543")]))
            .store(db_store())
            .build()
            .unwrap();
        assert_eq!(host.get::<DbOptions>("db").unwrap().unwrap().port, 6543);
    }

    #[test]
    fn later_store_has_priority_for_reads_and_writes() {
        let host = Livefig::builder()
            .store(db_store())
            .store(MemoryStore::from_pairs([("db:port", Some("1111"))]))
            .build()
            .unwrap();
        assert_eq!(host.get::<DbOptions>("db").unwrap().unwrap().port, 1111);

        host.try_save("db", |db: &mut DbOptions| db.port = 2222).unwrap();
        let providers = host.root().providers();
        assert_eq!(providers[1].section("db").value("db:port"), Some(Some("2222")));
        assert_eq!(providers[0].section("db").value("db:port"), Some(Some("2222")));
    }

    #[test]
    fn seed_initializes_empty_sections() {
        let host = Livefig::builder()
            .store(MemoryStore::from_pairs([("cache:ttl", Some("5"))]))
            .seed(Snapshot::from_pairs([
                ("db:host", Some("seeded")),
                ("db:port", Some("5432")),
                ("cache:ttl", Some("60")),
            ]))
            .seed_strategy(SeedStrategy::Initialize)
            .build()
            .unwrap();
        let root = host.root();
        assert_eq!(root.section("db").value("db:host"), Some(Some("seeded")));
        assert_eq!(root.section("cache").value("cache:ttl"), Some(Some("5")));
    }

    #[test]
    fn seed_from_toml_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("seed.toml");
        fs::write(&file, "[db]\nhost = \"from-toml\"\nport = 5432\n").unwrap();

        let host = Livefig::builder()
            .store(MemoryStore::new())
            .seed_toml_file(&file)
            .seed_strategy(SeedStrategy::InsertIfNotExists)
            .build()
            .unwrap();
        assert_eq!(host.get::<DbOptions>("db").unwrap().unwrap().host, "from-toml");
    }

    #[test]
    fn seed_without_strategy_is_ignored() {
        let host = Livefig::builder()
            .store(MemoryStore::new())
            .seed(Snapshot::from_pairs([("db:host", Some("seeded"))]))
            .build()
            .unwrap();
        assert!(host.get::<DbOptions>("db").unwrap().is_none());
    }

    #[test]
    fn sqlite_store_at_configured_path() {
        let dir = TempDir::new().unwrap();
        let settings = StoreSettings {
            data_path: Some(dir.path().join("opts.db")),
            ..StoreSettings::default()
        };
        let host = Livefig::builder()
            .app_name("myapp")
            .no_env()
            .settings(settings.clone())
            .sqlite(None)
            .build()
            .unwrap();
        assert!(host.try_add("db", |db: &mut DbOptions| {
            db.host = "h".into();
            db.port = 1;
        })
        .unwrap());
        drop(host);

        let reopened = Livefig::builder()
            .no_env()
            .settings(settings)
            .sqlite(None)
            .build()
            .unwrap();
        assert_eq!(reopened.get::<DbOptions>("db").unwrap().unwrap().host, "h");
    }

    #[test]
    fn slash_sections_are_normalized() {
        let host = Livefig::builder()
            .store(MemoryStore::from_pairs([
                ("apps:web:host", Some("w")),
                ("apps:web:port", Some("80")),
            ]))
            .build()
            .unwrap();
        assert_eq!(host.get::<DbOptions>("apps/web").unwrap().unwrap().port, 80);
    }

    #[test]
    fn registered_subtypes_bind() {
        let host = Livefig::builder()
            .store(MemoryStore::from_pairs([
                ("drawing:name", Some("d")),
                ("drawing:shape:Type", Some("Circle")),
                ("drawing:shape:radius", Some("3")),
            ]))
            .register_subtype::<CircleShape>("Shape", "CircleShape")
            .build()
            .unwrap();
        let drawing = host.get::<Drawing>("drawing").unwrap().unwrap();
        assert!(matches!(drawing.shape, Shape::CircleShape(ref c) if c.radius == 3.0));
        assert_eq!(host.registry().find_subtypes_of("Shape"), ["CircleShape".to_string()]);
    }

    // --- handle() ---

    #[test]
    fn handle_list_get_set_delete() {
        let host = Livefig::builder().store(db_store()).build().unwrap();

        let listing = host.handle(&OptionsAction::List { section: None }).unwrap();
        assert_eq!(listing.to_string(), "db:host = localhost\ndb:port = 5432");

        let got = host
            .handle(&OptionsAction::Get {
                path: "db/port".into(),
            })
            .unwrap();
        assert_eq!(got.to_string(), "db:port = 5432");

        let set = host
            .handle(&OptionsAction::Set {
                path: "db/port".into(),
                value: "5433".into(),
            })
            .unwrap();
        assert_eq!(set.to_string(), "Set db:port = 5433");
        assert_eq!(host.get::<DbOptions>("db").unwrap().unwrap().port, 5433);

        let deleted = host
            .handle(&OptionsAction::Delete {
                section: "db".into(),
            })
            .unwrap();
        assert_eq!(deleted.to_string(), "Deleted db");
        assert!(host.get::<DbOptions>("db").unwrap().is_none());
    }

    #[test]
    fn handle_patch_routes_by_type_name() {
        let host = Livefig::builder()
            .no_env()
            .store(db_store())
            .patchable::<DbOptions>()
            .build()
            .unwrap();

        let patched = host
            .handle(&OptionsAction::Patch {
                type_name: "dboptions".into(),
                section: "db".into(),
                patch: r#"{"port": 6000}"#.into(),
            })
            .unwrap();
        assert_eq!(patched.to_string(), "Patched db");
        let db = host.get::<DbOptions>("db").unwrap().unwrap();
        assert_eq!((db.host.as_str(), db.port), ("localhost", 6000));

        let unknown = host.handle(&OptionsAction::Patch {
            type_name: "Nope".into(),
            section: "db".into(),
            patch: "{}".into(),
        });
        assert!(matches!(unknown, Err(LivefigError::UnknownType(ref t)) if t == "Nope"));

        let malformed = host.handle(&OptionsAction::Patch {
            type_name: "DbOptions".into(),
            section: "db".into(),
            patch: "{port".into(),
        });
        assert!(matches!(malformed, Err(LivefigError::InvalidPatch { .. })));
    }

    #[test]
    fn handle_get_missing_key_errors() {
        let host = Livefig::builder().store(db_store()).build().unwrap();
        let result = host.handle(&OptionsAction::Get {
            path: "db:user".into(),
        });
        assert!(matches!(result, Err(LivefigError::SectionNotFound(_))));
    }

    #[test]
    fn shared_notifier_sees_saves() {
        let notifier = ChangeNotifier::new();
        let host = Livefig::builder()
            .app_name("shared")
            .no_env()
            .notifier(notifier.clone())
            .store(db_store())
            .build()
            .unwrap();
        host.try_save("db", |db: &mut DbOptions| db.port = 1).unwrap();
        assert_eq!(notifier.generation("shared"), 1);
    }

    #[test]
    fn refresh_picks_up_external_writes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("opts.json");
        let host = Livefig::builder().document(Some(file.clone())).build().unwrap();
        assert!(host.get::<DbOptions>("db").unwrap().is_none());

        fs::write(
            &file,
            r#"[{"id":"1","key":"db:host","value":"ext"},{"id":"2","key":"db:port","value":"9"}]"#,
        )
        .unwrap();
        assert!(host.refresh().unwrap());
        assert_eq!(host.get::<DbOptions>("db").unwrap().unwrap().host, "ext");
        assert!(!host.refresh().unwrap());
    }
}
