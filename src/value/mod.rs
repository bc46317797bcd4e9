//! Dynamically typed wire values.
//!
//! Every field of a [`Document`] holds a [`Value`], a closed tagged union over the types the
//! wire format can carry. Each variant maps to a stable one-byte [`ElementType`] tag, which the
//! [`codec`](crate::codec) writes in front of every element.
//!
//! # Coercion
//!
//! Assigning into an existing field first asks the field's current type whether it
//! [`accepts`](ElementType::accepts) the incoming value. An `Int64` field accepts any integer,
//! a `Double` field accepts any number, and so on. When the current type refuses, the field is
//! replaced by the freshly inferred variant instead of raising an error, so the type of a field
//! can change across assignments.
//!
//! # Typed reads
//!
//! Reads go through [`FromValue`] and report a [`Lookup`], which keeps "absent", "present but
//! incompatible" and "found" apart while still offering [`Lookup::unwrap_or`] for callers that
//! only want a default.
mod binary;
mod convert;
mod json;
mod object_id;
mod regex;

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::document::Document;

pub use binary::Binary;
pub use convert::{FromValue, Lookup};
pub use object_id::ObjectId;
pub use regex::{Regex, RegexOptions};

/// Errors raised while building values from foreign input.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("invalid object id '{0}'")]
    InvalidObjectId(String),

    #[error("expected an object, found {0}")]
    NotAnObject(&'static str),

    #[error("failed to reflect native value: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wire type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    Int32 = 0x10,
    Int64 = 0x12,
}

impl ElementType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => ElementType::Double,
            0x02 => ElementType::String,
            0x03 => ElementType::Document,
            0x04 => ElementType::Array,
            0x05 => ElementType::Binary,
            0x07 => ElementType::ObjectId,
            0x08 => ElementType::Boolean,
            0x09 => ElementType::DateTime,
            0x0A => ElementType::Null,
            0x0B => ElementType::Regex,
            0x10 => ElementType::Int32,
            0x12 => ElementType::Int64,
            _ => return None,
        })
    }

    /// Returns whether a field of this type can absorb `value` without changing type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (ElementType::Int32, Value::Int64(v)) => i32::try_from(*v).is_ok(),
            (ElementType::Int64, Value::Int32(_)) => true,
            (ElementType::Double, Value::Int32(_) | Value::Int64(_)) => true,
            (ElementType::DateTime, Value::Int64(_)) => true,
            (kind, value) => kind == value.element_type(),
        }
    }

    /// Converts `value` into this type, handing it back untouched when it is not accepted.
    pub fn coerce(self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (ElementType::Int32, Value::Int64(v)) => {
                i32::try_from(v).map(Value::Int32).map_err(|_| Value::Int64(v))
            }
            (ElementType::Int64, Value::Int32(v)) => Ok(Value::Int64(v.into())),
            (ElementType::Double, Value::Int32(v)) => Ok(Value::Double(v.into())),
            (ElementType::Double, Value::Int64(v)) => Ok(Value::Double(v as f64)),
            (ElementType::DateTime, Value::Int64(ms)) => {
                Ok(Value::DateTime(datetime_from_millis(ms)))
            }
            (kind, value) if kind == value.element_type() => Ok(value),
            (_, value) => Err(value),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Double => "double",
            ElementType::String => "string",
            ElementType::Document => "document",
            ElementType::Array => "array",
            ElementType::Binary => "binary",
            ElementType::ObjectId => "objectId",
            ElementType::Boolean => "bool",
            ElementType::DateTime => "date",
            ElementType::Null => "null",
            ElementType::Regex => "regex",
            ElementType::Int32 => "int",
            ElementType::Int64 => "long",
        };
        f.write_str(name)
    }
}

/// A single typed datum.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    ObjectId(ObjectId),
    Binary(Binary),
    /// Millisecond precision; sub-millisecond parts are dropped on the wire.
    DateTime(DateTime<Utc>),
    Regex(Regex),
    Array(Vec<Value>),
    Document(Document),
    Null,
}

impl Value {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Int32(_) => ElementType::Int32,
            Value::Int64(_) => ElementType::Int64,
            Value::Double(_) => ElementType::Double,
            Value::Boolean(_) => ElementType::Boolean,
            Value::String(_) => ElementType::String,
            Value::ObjectId(_) => ElementType::ObjectId,
            Value::Binary(_) => ElementType::Binary,
            Value::DateTime(_) => ElementType::DateTime,
            Value::Regex(_) => ElementType::Regex,
            Value::Array(_) => ElementType::Array,
            Value::Document(_) => ElementType::Document,
            Value::Null => ElementType::Null,
        }
    }

    pub fn type_tag(&self) -> u8 {
        self.element_type().tag()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts to `T`, `None` when the variant is incompatible.
    pub fn cast<T: FromValue>(&self) -> Option<T> {
        T::from_value(self)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Variant payload bytes, without tag or field name.
    pub fn encode(&self) -> Vec<u8> {
        crate::codec::encode_value(self)
    }
}

/// Milliseconds since the epoch, falling back to the epoch itself when out of range.
pub(crate) fn datetime_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )+
    };
}

impl_from! {
    i32 => Int32,
    i64 => Int64,
    f64 => Double,
    bool => Boolean,
    String => String,
    ObjectId => ObjectId,
    Binary => Binary,
    DateTime<Utc> => DateTime,
    Regex => Regex,
    Document => Document,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int64(value.into())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
