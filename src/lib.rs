//! Live, saveable options for Rust applications. Define a struct, point it
//! at one or more key/value stores, and read or save it by section.
//!
//! ```ignore
//! let host = Livefig::builder()
//!     .app_name("myapp")
//!     .sqlite(None)
//!     .build()?;
//!
//! let db: Option<Arc<DbOptions>> = host.get("db")?;
//! host.try_save("db", |db: &mut DbOptions| db.port = 5433)?;
//! ```
//!
//! That opens `myapp.db` in the platform data directory, layers `MYAPP__*`
//! environment variables on top, and binds the `db` section to a typed
//! struct. The save writes back only the keys that changed and every later
//! `get` sees the new value.
//!
//! # Flat storage
//!
//! Stores hold rows of `(id, key, value)`. Keys are colon-separated paths,
//! compared case-insensitively; values are strings or null:
//!
//! ```text
//! db:host            localhost
//! db:port            5432
//! db:replicas:0:host r1
//! tls:cert           <null>
//! ```
//!
//! [`flatten`](flatten::flatten) turns an options value into such a
//! [`Snapshot`] and [`unflatten`](unflatten::unflatten) binds it back.
//! Collections use their element index as the path segment. Anything that
//! cannot be represented as a path (a map with non-string keys, say) is
//! skipped during a save and left untouched in the store.
//!
//! # Struct as schema
//!
//! An options type implements [`Options`]: serde both ways, plus `Default`.
//! The default instance fills every path the store lacks, and also marks
//! the "nothing stored" state: a section that binds to exactly the defaults
//! is reported as absent (`Ok(None)`).
//!
//! # Layer precedence
//!
//! ```text
//! First store added      .store() / .sqlite() / .document()
//!        ↑ overridden by
//! Later stores           in the order they were added
//!        ↑ overridden by
//! Environment vars       PREFIX__SECTION__KEY (read-only)
//! ```
//!
//! Every layer is **sparse**: a store only needs the keys it wants to
//! contribute. A null value in a higher layer clears the subtree beneath it.
//!
//! # Saving
//!
//! [`OptionsHost::try_save`] reads the current value, applies the mutation
//! once, validates the result once, then writes the difference to every
//! writable store that already holds the section. The difference is a
//! [`ChangeSet`]:
//!
//! - a stored key missing from the new value is deleted,
//! - a new key is inserted with a fresh id,
//! - a key whose value changed is updated in place, keeping its id.
//!
//! A save that would leave the instance invalid writes nothing and returns
//! [`SaveOutcome::NotModified`]. A section no writable store holds returns
//! [`SaveOutcome::NotFound`]; use [`OptionsHost::try_add`] to create it.
//!
//! # Live reload
//!
//! Bound instances are cached per type and section. After a write the
//! providers reload and notify their subscribers through a
//! [`ChangeNotifier`], which evicts the cached instances. Writes from other
//! processes are picked up with [`OptionsHost::refresh`].
//!
//! # Polymorphic options
//!
//! A field whose concrete type varies is an enum of newtype variants, each
//! carrying a `Type` field. On bind the stored `Type` value selects the
//! variant: exact name first, then `"{value}{Base}"`, then the base type.
//! Register subtypes with [`LivefigBuilder::register_subtype`] to supply
//! their defaults. See the [`discriminator`] module.
//!
//! List elements, map values and enum variants have no default instance of
//! their own: fields they lack in storage bind as zero values unless
//! defaults are registered with [`LivefigBuilder::register_defaults`].
//!
//! # Clap adapter
//!
//! The `cli` module (behind the `clap` feature, on by default) provides
//! [`OptionsArgs`], which gives your app `options list|get|set|delete|patch`
//! subcommands. [`OptionsArgs::into_action`] produces an [`OptionsAction`]
//! that [`OptionsHost::handle`] executes. The core has no dependency on
//! clap:
//!
//! ```toml
//! livefig = { version = "...", default-features = false }
//! ```
//!
//! # Error handling
//!
//! All fallible operations return [`LivefigError`]. See the [`error`]
//! module for the full set.

pub mod diff;
pub mod discriminator;
pub mod error;
pub mod flatten;
pub mod path;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod unflatten;
pub mod validate;

mod builder;
mod cache;
#[cfg(feature = "clap")]
mod cli;
mod document;
mod env;
mod memory;
pub(crate) mod merge;
mod notify;
mod ops;
mod provider;
mod root;
mod save;
mod sqlite;

#[cfg(test)]
mod fixtures;

pub use builder::{Livefig, LivefigBuilder, OptionsHost};
pub use cache::BindCache;
#[cfg(feature = "clap")]
pub use cli::{OptionsArgs, OptionsSubcommand};
pub use diff::{ChangeSet, Delete, Insert, Update};
pub use discriminator::TypeRegistry;
pub use document::DocumentStore;
pub use env::EnvSource;
pub use error::LivefigError;
pub use memory::MemoryStore;
pub use notify::{ChangeNotifier, Subscription};
pub use ops::OptionsResult;
pub use provider::StoreProvider;
pub use root::ConfigurationRoot;
pub use settings::StoreSettings;
pub use snapshot::{FlatEntry, Snapshot, StoreId};
pub use sqlite::SqliteStore;
pub use store::ConfigurationStore;
pub use types::{DeleteOutcome, OptionsAction, SaveOutcome, SeedStrategy};
pub use validate::{Options, ValidationErrors, ValidationFailure};
