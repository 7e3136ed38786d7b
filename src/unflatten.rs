//! Rebuild typed instances from flat snapshots.
//!
//! The section's entries are first layered over the flattened default
//! instance, so any path the store lacks keeps its default value. The merged
//! entries are then arranged into a tree and fed through a serde
//! `Deserializer` that parses string leaves on demand, matches field names
//! case-insensitively and resolves discriminated subtypes.
//!
//! Instances below the root that have no default of their own (list
//! elements, map values, subtypes) start from the defaults registered for
//! their type name, if any. Fields still missing take the zero value of the
//! field type: `0`, `false`, `""`, `None`, an empty collection.
//!
//! Paths the target type does not know are ignored and logged at debug level
//! via `serde_ignored`, so stores can carry keys from newer or older schemas.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};

use crate::discriminator::{DISCRIMINATOR_FIELD, TypeRegistry};
use crate::error::LivefigError;
use crate::flatten;
use crate::merge;
use crate::path::{self, SEPARATOR};
use crate::snapshot::{FlatEntry, Snapshot};

/// Bind `section` of `snapshot` into a `T`.
pub fn unflatten<T>(snapshot: &Snapshot, section: &str) -> Result<T, LivefigError>
where
    T: Serialize + DeserializeOwned + Default,
{
    unflatten_with(snapshot, section, &TypeRegistry::default())
}

/// Like [`unflatten`], resolving discriminated subtypes through `registry`.
pub fn unflatten_with<T>(
    snapshot: &Snapshot,
    section: &str,
    registry: &TypeRegistry,
) -> Result<T, LivefigError>
where
    T: Serialize + DeserializeOwned + Default,
{
    let defaults = flatten::flatten(&T::default(), "")?;
    let stored: Snapshot = snapshot
        .iter()
        .filter_map(|e| {
            let rel = path::relative(&e.path, section)?;
            // A cleared section binds as its defaults.
            if rel.is_empty() && e.value.is_none() {
                return None;
            }
            Some(FlatEntry::new(rel, e.value.clone()))
        })
        .collect();
    let tree = Node::build(&merge::overlay(defaults, &stored));

    let deserializer = NodeDeserializer {
        node: &tree,
        path: section.to_string(),
        registry,
        fill: false,
    };
    let mut unknown = Vec::new();
    let value: T = serde_ignored::deserialize(deserializer, |p| unknown.push(p.to_string()))
        .map_err(|e: UnflattenError| LivefigError::BindFailed {
            section: section.to_string(),
            reason: e.to_string(),
        })?;

    if !unknown.is_empty() {
        tracing::debug!(section, ?unknown, "ignored paths unknown to the bound type");
    }
    Ok(value)
}

#[derive(Debug)]
pub struct UnflattenError(String);

impl fmt::Display for UnflattenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UnflattenError {}

impl de::Error for UnflattenError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        UnflattenError(msg.to_string())
    }
}

// --- Tree ---

/// One path segment. `value` is `None` when no entry sits exactly here,
/// `Some(None)` for an explicit null.
#[derive(Debug, Default)]
struct Node {
    name: String,
    value: Option<Option<String>>,
    children: IndexMap<String, Node>,
}

static ABSENT: LazyLock<Node> = LazyLock::new(Node::default);

impl Node {
    fn build(snapshot: &Snapshot) -> Node {
        let mut root = Node::default();
        for entry in snapshot {
            let segments: Vec<&str> = if entry.path.is_empty() {
                Vec::new()
            } else {
                entry.path.split(SEPARATOR).collect()
            };
            root.insert(&segments, entry.value.clone());
        }
        root
    }

    fn insert(&mut self, segments: &[&str], value: Option<String>) {
        match segments.split_first() {
            None => self.value = Some(value),
            Some((head, rest)) => self
                .children
                .entry(path::key_of(head))
                .or_insert_with(|| Node {
                    name: head.to_string(),
                    ..Node::default()
                })
                .insert(rest, value),
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(&path::key_of(name))
    }

    fn leaf(&self) -> Option<&str> {
        match &self.value {
            Some(Some(v)) if self.children.is_empty() => Some(v),
            _ => None,
        }
    }

    fn is_null(&self) -> bool {
        self.children.is_empty() && !matches!(self.value, Some(Some(_)))
    }

    fn is_sequence(&self) -> bool {
        !self.children.is_empty() && self.children.keys().all(|k| path::is_index(k))
    }

    /// Indexed children in index order; gaps close up.
    fn elements(&self) -> Vec<&Node> {
        let mut indexed: Vec<(usize, &Node)> = self
            .children
            .iter()
            .filter_map(|(k, n)| k.parse::<usize>().ok().map(|i| (i, n)))
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, n)| n).collect()
    }

    fn collect(&self, prefix: &str, out: &mut Snapshot) {
        if let Some(value) = &self.value {
            out.insert(FlatEntry::new(prefix, value.clone()));
        }
        for child in self.children.values() {
            child.collect(&path::join(prefix, &child.name), out);
        }
    }

    /// This subtree's children layered over registered defaults.
    fn over_defaults(&self, defaults: &Snapshot) -> Node {
        let mut own = Snapshot::new();
        for child in self.children.values() {
            child.collect(&child.name, &mut own);
        }
        Node::build(&merge::overlay(defaults.clone(), &own))
    }
}

// --- Deserializer ---

struct NodeDeserializer<'a> {
    node: &'a Node,
    path: String,
    registry: &'a TypeRegistry,
    /// Set below the root's default instance: missing fields are visited
    /// and bind as zero values.
    fill: bool,
}

impl<'a> NodeDeserializer<'a> {
    fn at(&self, node: &'a Node, segment: &str) -> NodeDeserializer<'a> {
        NodeDeserializer {
            node,
            path: path::join(&self.path, segment),
            registry: self.registry,
            fill: self.fill,
        }
    }

    fn filled(mut self) -> Self {
        self.fill = true;
        self
    }

    /// Nothing stored and nothing to fall back on.
    fn absent(&self) -> bool {
        self.fill && self.node.value.is_none() && self.node.children.is_empty()
    }

    fn error(&self, msg: impl fmt::Display) -> UnflattenError {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        UnflattenError(format!("'{path}': {msg}"))
    }

    fn scalar(&self) -> Result<&'a str, UnflattenError> {
        if let Some(v) = self.node.leaf() {
            return Ok(v);
        }
        if !self.node.children.is_empty() {
            Err(self.error("expected a value, found a section"))
        } else if self.node.value.is_some() {
            Err(self.error("value is null"))
        } else {
            Err(self.error("missing value"))
        }
    }

    fn struct_fields(&self, fields: &'static [&'static str]) -> Vec<(String, NodeDeserializer<'a>)> {
        let mut entries: Vec<(String, NodeDeserializer<'a>)> = self
            .node
            .children
            .values()
            .map(|child| {
                let key = fields
                    .iter()
                    .find(|f| f.eq_ignore_ascii_case(&child.name))
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| child.name.clone());
                (key, self.at(child, &child.name))
            })
            .collect();

        if self.fill {
            for field in fields {
                if self.node.child(field).is_none() {
                    entries.push((field.to_string(), self.at(&ABSENT, field)));
                }
            }
        }
        entries
    }
}

macro_rules! deserialize_parsed {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            if self.absent() {
                return visitor.$visit(<$ty>::default());
            }
            let raw = self.scalar()?;
            let parsed = raw.trim().parse::<$ty>().map_err(|e| {
                self.error(format_args!("invalid {} '{}': {}", stringify!($ty), raw, e))
            })?;
            visitor.$visit(parsed)
        }
    };
}

impl<'de, 'a> de::Deserializer<'de> for NodeDeserializer<'a> {
    type Error = UnflattenError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.node.is_sequence() {
            self.deserialize_seq(visitor)
        } else if !self.node.children.is_empty() {
            self.deserialize_map(visitor)
        } else {
            match self.node.leaf() {
                Some(v) => visitor.visit_str(v),
                None => visitor.visit_none(),
            }
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.absent() {
            return visitor.visit_bool(false);
        }
        let raw = self.scalar()?.trim();
        if raw.eq_ignore_ascii_case("true") {
            visitor.visit_bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            visitor.visit_bool(false)
        } else {
            Err(self.error(format_args!("invalid bool '{raw}'")))
        }
    }

    deserialize_parsed!(deserialize_i8, visit_i8, i8);
    deserialize_parsed!(deserialize_i16, visit_i16, i16);
    deserialize_parsed!(deserialize_i32, visit_i32, i32);
    deserialize_parsed!(deserialize_i64, visit_i64, i64);
    deserialize_parsed!(deserialize_i128, visit_i128, i128);
    deserialize_parsed!(deserialize_u8, visit_u8, u8);
    deserialize_parsed!(deserialize_u16, visit_u16, u16);
    deserialize_parsed!(deserialize_u32, visit_u32, u32);
    deserialize_parsed!(deserialize_u64, visit_u64, u64);
    deserialize_parsed!(deserialize_u128, visit_u128, u128);
    deserialize_parsed!(deserialize_f32, visit_f32, f32);
    deserialize_parsed!(deserialize_f64, visit_f64, f64);

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.absent() {
            return visitor.visit_char(char::default());
        }
        let raw = self.scalar()?;
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(self.error(format_args!("expected a single character, found '{raw}'"))),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.absent() {
            return visitor.visit_str("");
        }
        visitor.visit_str(self.scalar()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(self.error("bytes not supported"))
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.node.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self.filled())
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.node.children.is_empty() && self.node.leaf().is_some() {
            return Err(self.error("expected a sequence, found a value"));
        }
        let items = self
            .node
            .elements()
            .into_iter()
            .enumerate()
            .map(|(i, node)| self.at(node, &i.to_string()).filled())
            .collect::<Vec<_>>();
        visitor.visit_seq(NodeSeq {
            items: items.into_iter(),
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.node.leaf().is_some() {
            return Err(self.error("expected a section, found a value"));
        }
        let entries = self
            .node
            .children
            .values()
            .map(|child| (child.name.clone(), self.at(child, &child.name).filled()))
            .collect::<Vec<_>>();
        visitor.visit_map(NodeMap {
            entries: entries.into_iter(),
            pending: None,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        if self.node.leaf().is_some() {
            return Err(self.error("expected a section, found a value"));
        }
        if self.fill {
            if let Some(defaults) = self.registry.defaults_for(name) {
                let overlaid = self.node.over_defaults(defaults);
                let de = NodeDeserializer {
                    node: &overlaid,
                    path: self.path,
                    registry: self.registry,
                    fill: true,
                };
                let entries = de.struct_fields(fields);
                return visitor.visit_map(NodeMap {
                    entries: entries.into_iter(),
                    pending: None,
                });
            }
        }
        let entries = self.struct_fields(fields);
        visitor.visit_map(NodeMap {
            entries: entries.into_iter(),
            pending: None,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        // A plain value names a unit variant.
        if self.node.children.is_empty() && !self.absent() {
            let raw = self.scalar()?.trim();
            let variant = variants
                .iter()
                .copied()
                .find(|v| v.eq_ignore_ascii_case(raw))
                .unwrap_or(raw);
            let access: de::value::StrDeserializer<'_, UnflattenError> =
                variant.into_deserializer();
            return visitor.visit_enum(access);
        }

        let discriminator = self.node.child(DISCRIMINATOR_FIELD).and_then(Node::leaf);
        let variant = self
            .registry
            .resolve(name, variants, discriminator)
            .ok_or_else(|| self.error(format_args!("enum {name} has no variants")))?;

        let overlaid;
        let node = match self.registry.defaults_for(variant) {
            Some(defaults) => {
                overlaid = self.node.over_defaults(defaults);
                &overlaid
            }
            None => self.node,
        };
        visitor.visit_enum(NodeVariant {
            variant,
            de: NodeDeserializer {
                node,
                path: self.path,
                registry: self.registry,
                fill: true,
            },
        })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

struct NodeSeq<'a> {
    items: std::vec::IntoIter<NodeDeserializer<'a>>,
}

impl<'de, 'a> SeqAccess<'de> for NodeSeq<'a> {
    type Error = UnflattenError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        match self.items.next() {
            Some(de) => seed.deserialize(de).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct NodeMap<'a> {
    entries: std::vec::IntoIter<(String, NodeDeserializer<'a>)>,
    pending: Option<NodeDeserializer<'a>>,
}

impl<'de, 'a> MapAccess<'de> for NodeMap<'a> {
    type Error = UnflattenError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.entries.next() {
            Some((key, de)) => {
                self.pending = Some(de);
                let key: de::value::StringDeserializer<UnflattenError> = key.into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        let de = self
            .pending
            .take()
            .ok_or_else(|| UnflattenError("value requested before key".into()))?;
        seed.deserialize(de)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct NodeVariant<'a> {
    variant: &'static str,
    de: NodeDeserializer<'a>,
}

impl<'de, 'a> EnumAccess<'de> for NodeVariant<'a> {
    type Error = UnflattenError;
    type Variant = Self;

    fn variant_seed<S: DeserializeSeed<'de>>(
        self,
        seed: S,
    ) -> Result<(S::Value, Self::Variant), Self::Error> {
        let name: de::value::StrDeserializer<'static, UnflattenError> =
            self.variant.into_deserializer();
        let value = seed.deserialize(name)?;
        Ok((value, self))
    }
}

impl<'de, 'a> VariantAccess<'de> for NodeVariant<'a> {
    type Error = UnflattenError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, Self::Error> {
        seed.deserialize(self.de)
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_tuple(self.de, len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_struct(self.de, self.variant, fields, visitor)
    }
}
