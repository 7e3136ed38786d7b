//! Custom serde Serializer that flattens any `Serialize` value into `:` paths
//! with string values, keeping `Option::None` as an explicit null entry.
//!
//! Structs and string-keyed maps recurse with `prefix:field`. Sequences recurse
//! with `prefix:field:i`, so a list of records becomes one subtree per element.
//! A field whose shape has no flat form (byte buffers, non-string map keys,
//! keys containing `:`) is skipped as a whole and reported; a root value with
//! no flat form fails with [`LivefigError::UnsupportedShape`].

use serde::ser::{self, Serialize};

use crate::error::LivefigError;
use crate::path::{self, SEPARATOR};
use crate::snapshot::{FlatEntry, Snapshot};

/// Result of a flatten pass, including the subtrees that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct Flattened {
    pub snapshot: Snapshot,
    /// Paths of fields left out because their shape cannot be flattened.
    pub skipped: Vec<String>,
}

/// Flatten a `Serialize` value under `section`.
///
/// `DbOptions { host: "localhost", port: 5432 }` under `db` becomes
/// `[("db:host", Some("localhost")), ("db:port", Some("5432"))]`.
pub fn flatten<S: Serialize + ?Sized>(source: &S, section: &str) -> Result<Snapshot, LivefigError> {
    flatten_reporting(source, section).map(|f| f.snapshot)
}

/// Like [`flatten`] but also returns the skipped subtrees so callers can keep
/// them out of a diff.
pub fn flatten_reporting<S: Serialize + ?Sized>(
    source: &S,
    section: &str,
) -> Result<Flattened, LivefigError> {
    let mut out = Output::default();
    let serializer = FlattenSerializer {
        prefix: section.to_string(),
        out: &mut out,
    };
    source
        .serialize(serializer)
        .map_err(|e| LivefigError::UnsupportedShape {
            path: if e.path.is_empty() {
                section.to_string()
            } else {
                e.path
            },
            reason: e.reason,
        })?;

    for path in &out.skipped {
        tracing::warn!(%path, "skipping field that cannot be flattened");
    }

    Ok(Flattened {
        snapshot: out.entries.into_iter().collect(),
        skipped: out.skipped,
    })
}

#[derive(Debug)]
pub struct FlattenError {
    path: String,
    reason: String,
}

impl FlattenError {
    fn at(path: &str, reason: &str) -> Self {
        FlattenError {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for FlattenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "flatten error at '{}': {}", self.path, self.reason)
    }
}

impl std::error::Error for FlattenError {}

impl ser::Error for FlattenError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        FlattenError {
            path: String::new(),
            reason: msg.to_string(),
        }
    }
}

#[derive(Default)]
struct Output {
    entries: Vec<FlatEntry>,
    skipped: Vec<String>,
}

impl Output {
    /// Serialize one child; if its shape is unsupported, roll back whatever
    /// it emitted and record the child as skipped.
    fn child<T: Serialize + ?Sized>(&mut self, prefix: String, value: &T) {
        let mark = self.entries.len();
        let serializer = FlattenSerializer {
            prefix: prefix.clone(),
            out: &mut *self,
        };
        if value.serialize(serializer).is_err() {
            self.entries.truncate(mark);
            self.skipped.push(prefix);
        }
    }
}

impl Output {
    /// An empty collection is written as a null at its own path, so it
    /// replaces a non-empty default instead of falling through to it.
    fn empty_collection(&mut self, prefix: String) {
        if !prefix.is_empty() {
            self.entries.push(FlatEntry::new(prefix, None));
        }
    }
}

struct FlattenSerializer<'a> {
    prefix: String,
    out: &'a mut Output,
}

impl<'a> FlattenSerializer<'a> {
    fn emit(self, value: String) -> Result<(), FlattenError> {
        self.out.entries.push(FlatEntry::new(self.prefix, Some(value)));
        Ok(())
    }

    fn emit_none(self) -> Result<(), FlattenError> {
        self.out.entries.push(FlatEntry::new(self.prefix, None));
        Ok(())
    }
}

impl<'a> ser::Serializer for FlattenSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;
    type SerializeSeq = FlattenSeqSerializer<'a>;
    type SerializeTuple = FlattenSeqSerializer<'a>;
    type SerializeTupleStruct = FlattenSeqSerializer<'a>;
    type SerializeTupleVariant = FlattenSeqSerializer<'a>;
    type SerializeMap = FlattenMapSerializer<'a>;
    type SerializeStruct = FlattenStructSerializer<'a>;
    type SerializeStructVariant = FlattenStructSerializer<'a>;

    fn serialize_bool(self, v: bool) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<(), Self::Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<(), Self::Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<(), Self::Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<(), Self::Error> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<(), Self::Error> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<(), Self::Error> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_f64(self, v: f64) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<(), Self::Error> {
        self.emit(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), Self::Error> {
        Err(FlattenError::at(&self.prefix, "bytes not supported"))
    }

    fn serialize_none(self) -> Result<(), Self::Error> {
        self.emit_none()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    // Subtypes carry their own discriminator field, so the variant wrapper
    // adds nothing to the flat form.
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(FlattenSeqSerializer {
            prefix: self.prefix,
            out: self.out,
            index: 0,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(FlattenMapSerializer {
            prefix: self.prefix,
            out: self.out,
            current_key: None,
            len: 0,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(FlattenStructSerializer {
            prefix: self.prefix,
            out: self.out,
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(FlattenStructSerializer {
            prefix: self.prefix,
            out: self.out,
        })
    }
}

// --- SerializeStruct ---

struct FlattenStructSerializer<'a> {
    prefix: String,
    out: &'a mut Output,
}

impl<'a> ser::SerializeStruct for FlattenStructSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.out.child(path::join(&self.prefix, key), value);
        Ok(())
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<'a> ser::SerializeStructVariant for FlattenStructSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// --- SerializeMap ---

struct FlattenMapSerializer<'a> {
    prefix: String,
    out: &'a mut Output,
    current_key: Option<String>,
    len: usize,
}

impl<'a> ser::SerializeMap for FlattenMapSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Self::Error> {
        let key = key.serialize(KeySerializer)?;
        if key.is_empty() || key.contains(SEPARATOR) {
            return Err(FlattenError::at(
                &self.prefix,
                "map keys must be non-empty and free of ':'",
            ));
        }
        self.current_key = Some(key);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| FlattenError::at(&self.prefix, "map value without a key"))?;
        self.len += 1;
        self.out.child(path::join(&self.prefix, &key), value);
        Ok(())
    }

    fn end(self) -> Result<(), Self::Error> {
        if self.len == 0 {
            self.out.empty_collection(self.prefix);
        }
        Ok(())
    }
}

// --- SerializeSeq (each element gets its own indexed subtree) ---

struct FlattenSeqSerializer<'a> {
    prefix: String,
    out: &'a mut Output,
    index: usize,
}

impl<'a> ser::SerializeSeq for FlattenSeqSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        let serializer = FlattenSerializer {
            prefix: path::join(&self.prefix, &self.index.to_string()),
            out: &mut *self.out,
        };
        self.index += 1;
        value.serialize(serializer)
    }

    fn end(self) -> Result<(), Self::Error> {
        if self.index == 0 {
            self.out.empty_collection(self.prefix);
        }
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for FlattenSeqSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleStruct for FlattenSeqSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleVariant for FlattenSeqSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

// --- Key serializer (extracts string keys from map keys) ---

struct KeySerializer;

fn non_string_key() -> FlattenError {
    FlattenError::at("", "map keys must be strings")
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = FlattenError;
    type SerializeSeq = ser::Impossible<String, FlattenError>;
    type SerializeTuple = ser::Impossible<String, FlattenError>;
    type SerializeTupleStruct = ser::Impossible<String, FlattenError>;
    type SerializeTupleVariant = ser::Impossible<String, FlattenError>;
    type SerializeMap = ser::Impossible<String, FlattenError>;
    type SerializeStruct = ser::Impossible<String, FlattenError>;
    type SerializeStructVariant = ser::Impossible<String, FlattenError>;

    fn serialize_str(self, v: &str) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_bool(self, _: bool) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_i8(self, _: i8) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_i16(self, _: i16) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_i32(self, _: i32) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_i64(self, _: i64) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_u8(self, _: u8) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_u16(self, _: u16) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_u32(self, _: u32) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_u64(self, _: u64) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_f32(self, _: f32) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_f64(self, _: f64) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_char(self, v: char) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }
    fn serialize_bytes(self, _: &[u8]) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_none(self) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_some<T: Serialize + ?Sized>(self, _: &T) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_unit(self) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        v: &'static str,
    ) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        v: &T,
    ) -> Result<String, Self::Error> {
        v.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<String, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(non_string_key())
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(non_string_key())
    }
}
