use chrono::{DateTime, Utc};

use crate::document::Document;

use super::{Binary, ElementType, ObjectId, Regex, Value};

/// Native types that can be read out of a [`Value`].
///
/// Conversions never fail loudly: an incompatible variant yields `None` and the caller decides
/// whether that is an error or a reason to fall back to a default.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

/// Outcome of a typed field read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// No field at that path.
    Absent,
    /// A field exists but holds a type that does not convert.
    Incompatible(ElementType),
    Found(T),
}

impl<T: FromValue> Lookup<T> {
    pub(crate) fn of(value: Option<&Value>) -> Self {
        match value {
            None => Lookup::Absent,
            Some(value) => match T::from_value(value) {
                Some(found) => Lookup::Found(found),
                None => Lookup::Incompatible(value.element_type()),
            },
        }
    }
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    /// The found value, or `default` when the field is absent or incompatible.
    pub fn unwrap_or(self, default: T) -> T {
        self.found().unwrap_or(default)
    }

    pub fn unwrap_or_else(self, default: impl FnOnce() -> T) -> T {
        self.found().unwrap_or_else(default)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Lookup::Absent)
    }

    pub fn is_incompatible(&self) -> bool {
        matches!(self, Lookup::Incompatible(_))
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int32(v) => Some(*v),
            Value::Int64(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int32(v) => Some((*v).into()),
            Value::Int64(v) => Some(*v),
            Value::DateTime(dt) => Some(dt.timestamp_millis()),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Double(v) => Some(*v),
            Value::Int32(v) => Some((*v).into()),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_from_value! {
    bool => Boolean,
    String => String,
    ObjectId => ObjectId,
    Binary => Binary,
    DateTime<Utc> => DateTime,
    Regex => Regex,
    Document => Document,
    Vec<Value> => Array,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_read_on_int_is_incompatible() {
        let lookup: Lookup<String> = Lookup::of(Some(&Value::Int32(5)));
        assert_eq!(lookup, Lookup::Incompatible(ElementType::Int32));
        assert_eq!(lookup.unwrap_or("fallback".into()), "fallback");
    }

    #[test]
    fn absent_is_distinct_from_incompatible() {
        let lookup: Lookup<i32> = Lookup::of(None);
        assert!(lookup.is_absent());
        assert!(!lookup.is_incompatible());
        assert_eq!(lookup.unwrap_or(9), 9);
    }

    #[test]
    fn integers_widen_and_narrow() {
        assert_eq!(i64::from_value(&Value::Int32(3)), Some(3));
        assert_eq!(i32::from_value(&Value::Int64(3)), Some(3));
        assert_eq!(i32::from_value(&Value::Int64(1 << 40)), None);
        assert_eq!(f64::from_value(&Value::Int64(2)), Some(2.0));
        assert_eq!(bool::from_value(&Value::Int32(1)), None);
    }
}
