//! Writing typed options back through the owning stores.
//!
//! Stores are tried highest priority first. Read-only layers never own a
//! section for writing. After any successful write the root is reloaded,
//! which is what fires change notifications.

use std::sync::Arc;

use crate::cache::BindCache;
use crate::error::LivefigError;
use crate::flatten;
use crate::ops;
use crate::provider::StoreProvider;
use crate::root::ConfigurationRoot;
use crate::types::{DeleteOutcome, SaveOutcome};
use crate::validate::{self, Options};

pub struct SaveCoordinator {
    root: Arc<ConfigurationRoot>,
    cache: Arc<BindCache>,
    reload_on_change: bool,
}

impl SaveCoordinator {
    pub fn new(root: Arc<ConfigurationRoot>, cache: Arc<BindCache>, reload_on_change: bool) -> Self {
        Self {
            root,
            cache,
            reload_on_change,
        }
    }

    fn writable(&self) -> impl Iterator<Item = &Arc<StoreProvider>> {
        self.root.providers().iter().rev().filter(|p| p.is_writable())
    }

    /// Current value of `section`, or the default when nothing is stored.
    fn current<T: Options>(&self, section: &str) -> Result<T, LivefigError> {
        Ok(self
            .cache
            .get::<T>(section)?
            .map(|v| v.as_ref().clone())
            .unwrap_or_default())
    }

    /// Apply `mutate` to the current value of `section` and save the result
    /// to every writable store that owns the section.
    ///
    /// The mutation runs once and the result is validated once, before any
    /// store is touched. An invalid result saves nothing and reports
    /// [`SaveOutcome::NotModified`].
    pub fn try_save<T, F>(&self, section: &str, mutate: F) -> Result<SaveOutcome, LivefigError>
    where
        T: Options,
        F: FnOnce(&mut T),
    {
        let owners: Vec<&Arc<StoreProvider>> =
            self.writable().filter(|p| p.has_prefix(section)).collect();
        if owners.is_empty() {
            tracing::debug!(section, "no writable store owns section");
            return Ok(SaveOutcome::NotFound);
        }

        let mut value = self.current::<T>(section)?;
        mutate(&mut value);
        if let Err(errors) = validate::check(&value) {
            tracing::warn!(section, %errors, "refusing to save invalid options");
            return Ok(SaveOutcome::NotModified);
        }
        let flattened = flatten::flatten_reporting(&value, section)?;

        let mut saved = false;
        for provider in owners {
            match provider.save(section, &flattened) {
                Ok(changed) => saved |= changed,
                Err(e) => {
                    if saved {
                        self.after_write_logged(section);
                    }
                    return Err(e);
                }
            }
        }

        if saved {
            self.after_write(section)?;
            Ok(SaveOutcome::Ok)
        } else {
            Ok(SaveOutcome::NotModified)
        }
    }

    /// Replace the whole value of `section`.
    pub fn try_save_value<T: Options>(
        &self,
        section: &str,
        value: T,
    ) -> Result<SaveOutcome, LivefigError> {
        self.try_save(section, move |current: &mut T| *current = value)
    }

    /// Create `section` in the highest-priority writable store. Returns
    /// `false` when there is no writable store, the result is invalid, or it
    /// matches what is stored already.
    pub fn try_add<T, F>(&self, section: &str, mutate: F) -> Result<bool, LivefigError>
    where
        T: Options,
        F: FnOnce(&mut T),
    {
        let Some(target) = self.writable().next() else {
            tracing::debug!(section, "no writable store to add to");
            return Ok(false);
        };

        let mut value = self.current::<T>(section)?;
        mutate(&mut value);
        if let Err(errors) = validate::check(&value) {
            tracing::warn!(section, %errors, "refusing to add invalid options");
            return Ok(false);
        }
        let flattened = flatten::flatten_reporting(&value, section)?;

        let saved = target.save(section, &flattened)?;
        if saved {
            self.after_write(section)?;
        }
        Ok(saved)
    }

    /// Remove `section` from the highest-priority writable store owning it.
    pub fn try_delete(&self, section: &str) -> Result<DeleteOutcome, LivefigError> {
        for provider in self.writable().filter(|p| p.has_prefix(section)) {
            if provider.delete(section)? {
                self.after_write(section)?;
                return Ok(DeleteOutcome::NoContent);
            }
        }
        Ok(DeleteOutcome::NotFound)
    }

    /// Write one raw value, to the highest-priority writable store owning
    /// `path`, else to the highest-priority writable store.
    pub fn set_value(&self, path: &str, value: Option<String>) -> Result<SaveOutcome, LivefigError> {
        let target = self
            .writable()
            .find(|p| p.has_prefix(path))
            .or_else(|| self.writable().next());
        let Some(target) = target else {
            return Ok(SaveOutcome::NotFound);
        };
        if target.set(path, value)? {
            self.after_write(path)?;
            Ok(SaveOutcome::Ok)
        } else {
            Ok(SaveOutcome::NotModified)
        }
    }

    /// Apply a JSON merge patch to the current value of `section` and save
    /// it, or add the section when no store holds it yet. A `null` in the
    /// patch resets that field to its default. `NotFound` means there is no
    /// writable store at all.
    pub fn try_patch<T: Options>(
        &self,
        section: &str,
        patch: &serde_json::Value,
    ) -> Result<SaveOutcome, LivefigError> {
        let invalid = |e: serde_json::Error| LivefigError::InvalidPatch {
            section: section.to_string(),
            reason: e.to_string(),
        };
        let defaults = serde_json::to_value(T::default()).map_err(invalid)?;
        let mut document = serde_json::to_value(self.current::<T>(section)?).map_err(invalid)?;
        ops::merge_patch(&mut document, patch, Some(&defaults));
        let patched: T = serde_json::from_value(document).map_err(invalid)?;

        match self.try_save_value(section, patched.clone())? {
            SaveOutcome::NotFound if self.writable().next().is_none() => Ok(SaveOutcome::NotFound),
            SaveOutcome::NotFound => {
                let added = self.try_add(section, move |value: &mut T| *value = patched)?;
                Ok(if added {
                    SaveOutcome::Ok
                } else {
                    SaveOutcome::NotModified
                })
            }
            outcome => Ok(outcome),
        }
    }

    fn after_write(&self, section: &str) -> Result<(), LivefigError> {
        if self.reload_on_change {
            self.root.reload()
        } else {
            self.cache.invalidate(section);
            Ok(())
        }
    }

    fn after_write_logged(&self, section: &str) {
        if let Err(e) = self.after_write(section) {
            tracing::error!(section, error = %e, "reload after partial save failed");
        }
    }
}
