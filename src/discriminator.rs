//! Subtype resolution for polymorphic options.
//!
//! A polymorphic field is modelled as an enum whose newtype variants are the
//! known subtypes. Each subtype carries a `Type` field; flattening writes that
//! field like any other, and binding reads it back to pick the variant:
//!
//! 1. a subtype named exactly like the discriminator value,
//! 2. else a subtype named `"{value}{Base}"` (`Circle` → `CircleShape`),
//! 3. else the base type.
//!
//! Resolution never fails. A missing or unknown discriminator degrades to the
//! base type, which is the variant named like the enum itself if there is one
//! and otherwise the first declared variant.

use std::collections::HashMap;

use serde::Serialize;

use crate::flatten;
use crate::snapshot::Snapshot;
use crate::validate::short_type_name;

/// Name of the field that selects a subtype.
pub const DISCRIMINATOR_FIELD: &str = "Type";

/// Explicit base → subtypes mapping, populated at startup.
///
/// Without a registration for a base type every enum variant is a candidate.
/// A registration narrows the candidates to the listed names, which lets an
/// adapter hide variants that should never be selected from stored data.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    subtypes: HashMap<String, Vec<String>>,
    defaults: HashMap<String, Snapshot>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the subtypes of `base`. Repeated calls extend the list.
    pub fn register<I, S>(&mut self, base: &str, subtypes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.subtypes.entry(base.to_string()).or_default();
        for subtype in subtypes {
            let subtype = subtype.into();
            if !entry.contains(&subtype) {
                entry.push(subtype);
            }
        }
        self
    }

    /// Register one subtype together with its default instance, so a stored
    /// subtype missing some of its fields still binds with defaults for them.
    pub fn register_subtype<S>(&mut self, base: &str, subtype: &str) -> &mut Self
    where
        S: Serialize + Default,
    {
        self.insert_defaults::<S>(subtype);
        self.register(base, [subtype])
    }

    /// Register the defaults of struct `S` under its type name.
    ///
    /// Instances with no default of their own (list elements, map values,
    /// subtypes) start from these when bound; without a registration their
    /// missing fields take the zero value of the field type.
    pub fn register_defaults<S>(&mut self) -> &mut Self
    where
        S: Serialize + Default,
    {
        self.insert_defaults::<S>(short_type_name::<S>());
        self
    }

    fn insert_defaults<S: Serialize + Default>(&mut self, name: &str) {
        match flatten::flatten(&S::default(), "") {
            Ok(defaults) => {
                self.defaults.insert(name.to_string(), defaults);
            }
            Err(e) => tracing::warn!(name, error = %e, "defaults not flattenable"),
        }
    }

    /// Flattened defaults registered for a subtype or struct name, relative
    /// to the instance.
    pub fn defaults_for(&self, name: &str) -> Option<&Snapshot> {
        self.defaults.get(name)
    }

    pub fn find_subtypes_of(&self, base: &str) -> &[String] {
        self.subtypes.get(base).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up a registered type name, base or subtype.
    pub fn resolve_by_name(&self, name: &str) -> Option<&str> {
        self.subtypes.iter().find_map(|(base, subs)| {
            if base == name {
                Some(base.as_str())
            } else {
                subs.iter().find(|s| *s == name).map(String::as_str)
            }
        })
    }

    /// Pick the variant of enum `base` that `discriminator` selects.
    ///
    /// `variants` is the enum's declared variant list; an empty list has no
    /// answer and yields `None`.
    pub fn resolve(
        &self,
        base: &str,
        variants: &'static [&'static str],
        discriminator: Option<&str>,
    ) -> Option<&'static str> {
        let fallback = variants
            .iter()
            .copied()
            .find(|v| *v == base)
            .or_else(|| variants.first().copied())?;

        let Some(value) = discriminator.map(str::trim).filter(|v| !v.is_empty()) else {
            tracing::debug!(base, "no discriminator, binding base type");
            return Some(fallback);
        };

        let registered = self.find_subtypes_of(base);
        let candidates: Vec<&'static str> = variants
            .iter()
            .copied()
            .filter(|v| *v != base)
            .filter(|v| registered.is_empty() || registered.iter().any(|r| r == v))
            .collect();

        let conventional = format!("{value}{base}");
        let resolved = candidates
            .iter()
            .copied()
            .find(|v| *v == value)
            .or_else(|| candidates.iter().copied().find(|v| *v == conventional));

        match resolved {
            Some(variant) => Some(variant),
            None => {
                tracing::debug!(base, discriminator = value, "unknown subtype, binding base type");
                Some(fallback)
            }
        }
    }
}
