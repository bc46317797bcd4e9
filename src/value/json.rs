//! Bridge between [`Value`] and `serde_json`, using the extended JSON wrappers
//! (`$oid`, `$date`, `$binary`, `$regex`) for types JSON cannot express directly.
use serde::Serialize;
use serde_json::{Map, Number, Value as Json, json};

use crate::document::Document;

use super::{Binary, ObjectId, Regex, Value, ValueError, datetime_from_millis};

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => number(&n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => extended(map),
        }
    }
}

fn number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        return i32::try_from(i).map_or(Value::Int64(i), Value::Int32);
    }
    Value::Double(n.as_f64().unwrap_or(f64::NAN))
}

/// Recognises single-key extended JSON wrappers, otherwise builds a document.
fn extended(map: Map<String, Json>) -> Value {
    if map.len() == 1 {
        match map.iter().next() {
            Some((key, Json::String(hex))) if key == "$oid" => {
                if let Ok(id) = ObjectId::parse_str(hex) {
                    return Value::ObjectId(id);
                }
            }
            Some((key, Json::Number(ms))) if key == "$date" => {
                if let Some(ms) = ms.as_i64() {
                    return Value::DateTime(datetime_from_millis(ms));
                }
            }
            _ => {}
        }
    }
    if let (Some(Json::String(pattern)), 2) = (map.get("$regex"), map.len()) {
        if let Some(Json::String(flags)) = map.get("$options") {
            return Value::Regex(Regex::with_flags(pattern.clone(), flags));
        }
    }
    if let (Some(Json::String(encoded)), 2) = (map.get("$binary"), map.len()) {
        let subtype = map.get("$type").and_then(Json::as_u64).map(u8::try_from);
        if let (Ok(bytes), Some(Ok(subtype))) = (hex::decode(encoded), subtype) {
            return Value::Binary(Binary::new(subtype, bytes));
        }
    }
    Value::Document(map.into_iter().collect())
}

impl Value {
    pub fn to_json(&self) -> Json {
        match self {
            Value::Int32(v) => json!(v),
            Value::Int64(v) => json!(v),
            Value::Double(v) => Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::Boolean(b) => Json::Bool(*b),
            Value::String(s) => Json::String(s.clone()),
            Value::ObjectId(id) => json!({ "$oid": id.to_hex() }),
            Value::Binary(Binary { subtype, bytes }) => {
                json!({ "$binary": hex::encode(bytes), "$type": subtype })
            }
            Value::DateTime(dt) => json!({ "$date": dt.timestamp_millis() }),
            Value::Regex(regex) => {
                json!({ "$regex": regex.pattern, "$options": regex.options.to_flags() })
            }
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Document(doc) => doc.to_json(),
            Value::Null => Json::Null,
        }
    }
}

impl Document {
    /// Renders the document as a JSON object, keeping field order.
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Parses a JSON object into a document.
    pub fn parse_json(s: &str) -> Result<Self, ValueError> {
        let json: Json = serde_json::from_str(s)?;
        Self::from_json(json)
    }

    /// Reflects any serializable native value into a document, field by field.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ValueError> {
        Self::from_json(serde_json::to_value(value)?)
    }

    fn from_json(json: Json) -> Result<Self, ValueError> {
        match json {
            Json::Object(map) => Ok(map.into_iter().collect()),
            other => Err(ValueError::NotAnObject(kind(&other))),
        }
    }
}

fn kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
