//! Memoized bound instances, invalidated on change notification.
//!
//! Entries are keyed by `(type, section)`. A bound instance whose content hash
//! equals the hash of `T::default()` counts as "no such section": it is
//! reported absent and not cached, so the next call binds again.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::discriminator::TypeRegistry;
use crate::error::LivefigError;
use crate::flatten;
use crate::notify::Subscription;
use crate::path;
use crate::root::ConfigurationRoot;
use crate::unflatten;
use crate::validate::{self, Options, short_type_name};

type CacheKey = (TypeId, String);
type ContentHash = [u8; 32];

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    _subscription: Subscription,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    baselines: HashMap<TypeId, ContentHash>,
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BindCache {
    root: Arc<ConfigurationRoot>,
    registry: Arc<TypeRegistry>,
    state: Arc<Mutex<CacheState>>,
}

impl BindCache {
    pub fn new(root: Arc<ConfigurationRoot>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            root,
            registry,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// The instance bound from `section`, or `None` if the section holds
    /// nothing beyond defaults.
    ///
    /// Binding runs under the cache lock, so concurrent misses are serialized.
    pub fn get<T: Options>(&self, section: &str) -> Result<Option<Arc<T>>, LivefigError> {
        let key: CacheKey = (TypeId::of::<T>(), path::key_of(section));
        let mut state = lock(&self.state);

        if let Some(entry) = state.entries.get(&key) {
            if let Ok(value) = Arc::clone(&entry.value).downcast::<T>() {
                return Ok(Some(value));
            }
        }

        let source = self.root.source();
        let notifier = self.root.notifier();
        let generation = notifier.generation(source);

        let value: T = unflatten::unflatten_with(&self.root.section(section), section, &self.registry)?;

        let baseline = match state.baselines.get(&TypeId::of::<T>()) {
            Some(hash) => *hash,
            None => {
                let hash = content_hash(&T::default())?;
                state.baselines.insert(TypeId::of::<T>(), hash);
                hash
            }
        };
        if content_hash(&value)? == baseline {
            tracing::debug!(section, ty = short_type_name::<T>(), "section holds only defaults");
            return Ok(None);
        }

        let value = Arc::new(value);
        let weak = Arc::downgrade(&self.state);
        let evict = key.clone();
        let subscription = notifier.register_change_callback_at(source, generation, move || {
            if let Some(state) = weak.upgrade() {
                let removed = lock(&state).entries.remove(&evict);
                if removed.is_some() {
                    tracing::debug!(section = %evict.1, "evicted bound instance");
                }
            }
        });

        // A reload slipped in while binding; hand the value out uncached.
        let Some(subscription) = subscription else {
            return Ok(Some(value));
        };
        state.entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
                _subscription: subscription,
            },
        );
        Ok(Some(value))
    }

    /// Like [`get`](Self::get), but a present instance must also validate.
    pub fn get_valid<T: Options>(&self, section: &str) -> Result<Option<Arc<T>>, LivefigError> {
        let value = self.get::<T>(section)?;
        if let Some(v) = &value {
            validate::ensure_valid(v.as_ref())?;
        }
        Ok(value)
    }

    /// Drop cached instances for `section`, its ancestors and descendants.
    pub fn invalidate(&self, section: &str) -> usize {
        let removed: Vec<CacheEntry> = {
            let mut state = lock(&self.state);
            let keys: Vec<CacheKey> = state
                .entries
                .keys()
                .filter(|(_, s)| path::is_within(s, section) || path::is_within(section, s))
                .cloned()
                .collect();
            keys.iter().filter_map(|k| state.entries.remove(k)).collect()
        };
        removed.len()
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut lock(&self.state).entries);
        drop(removed);
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// SHA-256 over the flattened, path-sorted form of `value`.
fn content_hash<T: Serialize>(value: &T) -> Result<ContentHash, LivefigError> {
    let flat = flatten::flatten(value, "")?;
    let mut entries: Vec<(String, Option<&str>)> = flat
        .iter()
        .map(|e| (path::key_of(&e.path), e.value.as_deref()))
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for (key, value) in entries {
        hasher.update(key.as_bytes());
        match value {
            Some(v) => {
                hasher.update([1u8]);
                hasher.update(v.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update([0xffu8]);
    }
    Ok(hasher.finalize().into())
}
