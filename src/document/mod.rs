//! Ordered, schemaless documents.
//!
//! A [`Document`] maps field names to [`Value`]s and preserves insertion order, which the wire
//! format depends on: two documents with the same fields in a different order encode to
//! different bytes.
//!
//! # Paths
//!
//! Accessors taking a `path` resolve dotted paths through nested documents (see [`path`]).
//! [`Document::set`] creates missing intermediate documents on the way down.
//!
//! # Removal ledger
//!
//! [`Document::remove`] deletes a field and records its path. The ledger is not encoded and does
//! not take part in equality; it exists for callers that turn local edits into update commands.
//!
//! # Example
//! ```rust
//! use docwire::{Document, Value, doc};
//!
//! let mut person = doc! { "name" => "Bob", "age" => 41 };
//! person.set("address.city", "Oslo");
//!
//! assert_eq!(person.get_str("address.city"), Some("Oslo"));
//! assert_eq!(person.get_or("name", 0), 0);
//! assert_eq!(person.get("age"), Some(&Value::Int32(41)));
//! ```
pub mod path;

use indexmap::{IndexMap, IndexSet, map};
use log::trace;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::value::{FromValue, Lookup, Value, ValueError};

/// Builds a [`Document`] from `name => value` pairs.
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };
    ( $( $name:expr => $value:expr ),+ $(,)? ) => {{
        let mut doc = $crate::document::Document::new();
        $( doc.insert($name, $value); )+
        doc
    }};
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: IndexMap<String, Value>,
    removed: IndexSet<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn iter(&self) -> map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.fields.into_values().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = path::split(path);
        let (last, parents) = segments.split_last()?;
        let mut doc = self;
        for segment in parents {
            doc = doc.fields.get(*segment)?.as_document()?;
        }
        doc.fields.get(*last)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        let segments = path::split(path);
        let (last, parents) = segments.split_last()?;
        let mut doc = self;
        for segment in parents {
            doc = doc.fields.get_mut(*segment)?.as_document_mut()?;
        }
        doc.fields.get_mut(*last)
    }

    /// Typed read distinguishing absent, incompatible and found fields.
    pub fn get_as<T: FromValue>(&self, path: &str) -> Lookup<T> {
        Lookup::of(self.get(path))
    }

    /// Typed read returning `default` when the field is absent or holds an incompatible type.
    pub fn get_or<T: FromValue>(&self, path: &str, default: T) -> T {
        self.get_as(path).unwrap_or(default)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_document(&self, path: &str) -> Option<&Document> {
        self.get(path).and_then(Value::as_document)
    }

    /// Assigns `value` at `path`.
    ///
    /// Missing intermediate documents are created and non-document intermediates are replaced.
    /// An existing target field keeps its type and position when that type accepts the value;
    /// otherwise it is replaced in place by the inferred variant.
    ///
    /// Field names are encoded as terminator-style strings, so a name containing a NUL byte
    /// is cut at the first NUL on the wire.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        self.removed.shift_remove(path);

        let segments = path::split(path);
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut doc = self;
        for segment in parents {
            let Some(child) = doc.child_mut(segment) else {
                return;
            };
            doc = child;
        }
        doc.assign(last, value);
    }

    /// Adds a top-level field by literal name, moving it to the end if it already existed.
    /// The name leaves the removal ledger. Like [`Document::set`], a name containing a NUL
    /// byte is cut at the first NUL when encoded.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        self.removed.shift_remove(&name);
        let previous = self.fields.shift_remove(&name);
        self.fields.insert(name, value.into());
        previous
    }

    /// Deletes the field at `path` and records the path in the removal ledger.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let segments = path::split(path);
        let removed = self.take(&segments);
        if removed.is_some() {
            trace!("removed field '{path}'");
            self.removed.insert(path.to_owned());
        }
        removed
    }

    pub fn removed_fields(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    pub fn was_removed(&self, path: &str) -> bool {
        self.removed.contains(path)
    }

    pub fn clear_removed(&mut self) {
        self.removed.clear();
    }

    /// Copies every field of `other` over this document.
    pub fn merge(&mut self, other: &Document, skip_nulls: bool) {
        self.merge_pairs(
            other.iter().map(|(name, value)| (name.clone(), value.clone())),
            skip_nulls,
        );
    }

    pub fn merge_pairs<I, K, V>(&mut self, pairs: I, skip_nulls: bool)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in pairs {
            let value = value.into();
            if skip_nulls && value.is_null() {
                continue;
            }
            self.insert(name, value);
        }
    }

    /// Merges the fields of a serializable native value.
    pub fn merge_serialize<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        skip_nulls: bool,
    ) -> Result<(), ValueError> {
        let other = Document::from_serialize(value)?;
        self.merge_pairs(other.fields, skip_nulls);
        Ok(())
    }

    /// Wire encoding of the document.
    pub fn to_bytes(&self) -> Vec<u8> {
        crate::codec::encode_document(self)
    }

    /// Hex SHA-256 over the encoded bytes; changes whenever a field, value or order changes.
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(self.to_bytes()))
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut Document> {
        let slot = self.fields.entry(name.to_owned()).or_insert(Value::Null);
        if !matches!(slot, Value::Document(_)) {
            *slot = Value::Document(Document::new());
        }
        slot.as_document_mut()
    }

    fn assign(&mut self, name: &str, value: Value) {
        match self.fields.get_mut(name) {
            Some(slot) => {
                let current = slot.element_type();
                *slot = current.coerce(value).unwrap_or_else(|value| {
                    trace!(
                        "field '{name}' changes type from {current} to {}",
                        value.element_type()
                    );
                    value
                });
            }
            None => {
                self.fields.insert(name.to_owned(), value);
            }
        }
    }

    fn take(&mut self, segments: &[&str]) -> Option<Value> {
        let (last, parents) = segments.split_last()?;
        let mut doc = self;
        for segment in parents {
            doc = doc.fields.get_mut(*segment)?.as_document_mut()?;
        }
        doc.fields.shift_remove(*last)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len() && self.fields.iter().eq(other.fields.iter())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        doc.merge_pairs(iter, false);
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
