use crate::{document::Document, value::Value};

pub fn encode_document(doc: &Document) -> Vec<u8> {
    let mut buf = Vec::new();
    write_document(&mut buf, doc);
    buf
}

/// Payload bytes of a single value, without tag or field name.
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(&mut buf, value);
    buf
}

/// Appends `[int32 length][elements][0x00]`; the length counts itself and the terminator.
pub fn write_document(buf: &mut Vec<u8>, doc: &Document) {
    write_elements(buf, doc.iter().map(|(name, value)| (name.as_str(), value)));
}

fn write_array(buf: &mut Vec<u8>, items: &[Value]) {
    let keys: Vec<String> = (0..items.len()).map(|i| i.to_string()).collect();
    write_elements(buf, keys.iter().map(String::as_str).zip(items));
}

fn write_elements<'a>(buf: &mut Vec<u8>, elements: impl Iterator<Item = (&'a str, &'a Value)>) {
    let start = buf.len();
    buf.extend_from_slice(&[0; 4]);
    for (name, value) in elements {
        write_element(buf, name, value);
    }
    buf.push(0);
    let len = (buf.len() - start) as i32;
    buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
}

pub fn write_element(buf: &mut Vec<u8>, name: &str, value: &Value) {
    buf.push(value.type_tag());
    write_cstring(buf, name);
    write_value(buf, value);
}

pub fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Int32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Int64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Boolean(b) => buf.push(u8::from(*b)),
        Value::String(s) => write_string(buf, s),
        Value::ObjectId(id) => buf.extend_from_slice(&id.bytes()),
        Value::Binary(bin) => {
            buf.extend_from_slice(&(bin.bytes.len() as i32).to_le_bytes());
            buf.push(bin.subtype);
            buf.extend_from_slice(&bin.bytes);
        }
        Value::DateTime(dt) => buf.extend_from_slice(&dt.timestamp_millis().to_le_bytes()),
        Value::Regex(regex) => {
            write_cstring(buf, &regex.pattern);
            write_cstring(buf, &regex.options.to_flags());
        }
        Value::Array(items) => write_array(buf, items),
        Value::Document(doc) => write_document(buf, doc),
        Value::Null => {}
    }
}

/// Terminator-style string. Input is cut at the first interior NUL byte.
pub fn write_cstring(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    buf.extend_from_slice(&bytes[..end]);
    buf.push(0);
}

/// Length-prefixed string: int32 byte count including the terminator, bytes, 0x00.
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as i32 + 1).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}
