use std::io::Read;

use log::{debug, warn};

use crate::{
    document::Document,
    value::{Binary, ElementType, ObjectId, Regex, RegexOptions, Value, datetime_from_millis},
};

use super::DecodeError;

/// Largest document accepted from a stream.
pub const MAX_DOCUMENT_LEN: i32 = 16 * 1024 * 1024;

/// Deepest nesting of documents and arrays accepted while decoding.
pub const MAX_DEPTH: usize = 128;

/// Decodes exactly one document; bytes left over after it are an error.
pub fn decode_document(bytes: &[u8]) -> Result<Document, DecodeError> {
    let mut decoder = Decoder::new(bytes);
    let doc = decoder.document()?;
    if !decoder.is_empty() {
        return Err(DecodeError::TrailingBytes(decoder.remaining()));
    }
    Ok(doc)
}

/// Decodes the payload of a single value of type `kind`.
pub fn decode_value(kind: ElementType, bytes: &[u8]) -> Result<Value, DecodeError> {
    Decoder::new(bytes).known(kind)
}

/// Reads one length-announced document from a stream.
pub fn read_document<R: Read>(reader: &mut R) -> Result<Document, DecodeError> {
    let mut prefix = [0; 4];
    reader.read_exact(&mut prefix)?;
    let len = i32::from_le_bytes(prefix);
    if !(5..=MAX_DOCUMENT_LEN).contains(&len) {
        return Err(DecodeError::InvalidLength(len));
    }

    let mut bytes = vec![0; len as usize];
    bytes[..4].copy_from_slice(&prefix);
    reader.read_exact(&mut bytes[4..])?;
    decode_document(&bytes)
}

/// Bounded cursor over wire bytes.
///
/// Every read checks the remaining length first, so truncated input surfaces as
/// [`DecodeError::UnexpectedEof`] instead of a panic or a wrong value.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        self.array().map(i32::from_le_bytes)
    }

    pub fn i64(&mut self) -> Result<i64, DecodeError> {
        self.array().map(i64::from_le_bytes)
    }

    pub fn f64(&mut self) -> Result<f64, DecodeError> {
        self.array().map(f64::from_le_bytes)
    }

    /// Terminator-style string.
    pub fn cstring(&mut self) -> Result<String, DecodeError> {
        let rest = &self.data[self.pos..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(DecodeError::UnexpectedEof)?;
        let bytes = self.take(nul + 1)?;
        utf8(&bytes[..nul])
    }

    /// Length-prefixed string.
    pub fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.i32()?;
        if len < 1 {
            return Err(DecodeError::InvalidLength(len));
        }
        let bytes = self.take(len as usize)?;
        match bytes.split_last() {
            Some((0, text)) => utf8(text),
            _ => Err(DecodeError::MissingTerminator),
        }
    }

    pub fn document(&mut self) -> Result<Document, DecodeError> {
        let mut doc = Document::new();
        for (name, value) in self.elements()? {
            doc.insert(name, value);
        }
        Ok(doc)
    }

    /// Array elements in encounter order; positional keys are discarded.
    fn array_value(&mut self) -> Result<Vec<Value>, DecodeError> {
        Ok(self
            .elements()?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// Reads a length-announced element list. Parsing stops at the announced length, never
    /// at the first zero byte.
    fn elements(&mut self) -> Result<Vec<(String, Value)>, DecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }
        let len = self.i32()?;
        if len < 5 || (len as usize - 4) > self.remaining() {
            return Err(DecodeError::InvalidLength(len));
        }
        let body = self.take(len as usize - 4)?;
        let Some((0, elements)) = body.split_last() else {
            return Err(DecodeError::MissingTerminator);
        };

        let mut inner = Decoder {
            data: elements,
            pos: 0,
            depth: self.depth + 1,
        };
        let mut out = Vec::new();
        while !inner.is_empty() {
            let tag = inner.u8()?;
            let name = inner.cstring()?;
            match inner.element(tag)? {
                Some(value) => out.push((name, value)),
                None => {
                    warn!(
                        "unknown element type 0x{tag:02x} for field '{name}', skipping {} bytes",
                        inner.remaining()
                    );
                    out.push((name, Value::Null));
                    break;
                }
            }
        }
        Ok(out)
    }

    /// `None` when the tag is unknown and the payload size cannot be determined.
    fn element(&mut self, tag: u8) -> Result<Option<Value>, DecodeError> {
        match ElementType::from_tag(tag) {
            Some(kind) => self.known(kind).map(Some),
            None => self.foreign(tag),
        }
    }

    fn known(&mut self, kind: ElementType) -> Result<Value, DecodeError> {
        Ok(match kind {
            ElementType::Double => Value::Double(self.f64()?),
            ElementType::String => Value::String(self.string()?),
            ElementType::Document => Value::Document(self.document()?),
            ElementType::Array => Value::Array(self.array_value()?),
            ElementType::Binary => {
                let len = self.i32()?;
                if len < 0 {
                    return Err(DecodeError::InvalidLength(len));
                }
                let subtype = self.u8()?;
                Value::Binary(Binary::new(subtype, self.take(len as usize)?.to_vec()))
            }
            ElementType::ObjectId => Value::ObjectId(ObjectId::from_bytes(self.array()?)),
            ElementType::Boolean => match self.u8()? {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                b => return Err(DecodeError::InvalidBoolean(b)),
            },
            ElementType::DateTime => Value::DateTime(datetime_from_millis(self.i64()?)),
            ElementType::Null => Value::Null,
            ElementType::Regex => {
                let pattern = self.cstring()?;
                let flags = self.cstring()?;
                Value::Regex(Regex::with_options(pattern, RegexOptions::from_flags(&flags)))
            }
            ElementType::Int32 => Value::Int32(self.i32()?),
            ElementType::Int64 => Value::Int64(self.i64()?),
        })
    }

    /// Skips payloads of standard types this crate does not model and degrades them to null.
    fn foreign(&mut self, tag: u8) -> Result<Option<Value>, DecodeError> {
        match tag {
            // undefined, min key, max key
            0x06 | 0x7F | 0xFF => {}
            // javascript code, symbol
            0x0D | 0x0E => {
                self.string()?;
            }
            // db pointer
            0x0C => {
                self.string()?;
                self.take(ObjectId::LEN)?;
            }
            // code with scope
            0x0F => {
                let len = self.i32()?;
                if len < 4 {
                    return Err(DecodeError::InvalidLength(len));
                }
                self.take(len as usize - 4)?;
            }
            // timestamp
            0x11 => {
                self.take(8)?;
            }
            // decimal128
            0x13 => {
                self.take(16)?;
            }
            _ => return Ok(None),
        }
        debug!("decoded unsupported element type 0x{tag:02x} as null");
        Ok(Some(Value::Null))
    }
}

fn utf8(bytes: &[u8]) -> Result<String, DecodeError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| DecodeError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use crate::{codec::encode_document, doc};

    use super::*;

    fn name_and_age_bytes() -> Vec<u8> {
        [
            &28_i32.to_le_bytes()[..],
            &[0x02],
            b"name\0",
            &4_i32.to_le_bytes(),
            b"Bob\0",
            &[0x10],
            b"age\0",
            &41_i32.to_le_bytes(),
            &[0x00],
        ]
        .concat()
    }

    /// Wraps raw element bytes in a document envelope.
    fn envelope(elements: &[u8]) -> Vec<u8> {
        let len = (elements.len() + 5) as i32;
        [&len.to_le_bytes()[..], elements, &[0]].concat()
    }

    #[test]
    fn decodes_name_and_age() {
        let doc = decode_document(&name_and_age_bytes()).unwrap();
        assert_eq!(doc, doc! { "name" => "Bob", "age" => 41 });
    }

    #[test]
    fn round_trips_every_variant() {
        let doc = doc! {
            "int" => 7,
            "long" => -9_000_000_000_i64,
            "double" => 2.5,
            "flag" => false,
            "text" => "zero\0inside",
            "id" => ObjectId::from_bytes([7; 12]),
            "bin" => Binary::new(Binary::USER_DEFINED, vec![0, 1, 0, 2]),
            "when" => datetime_from_millis(1_700_000_000_123),
            "re" => Regex::with_flags("^a.b$", "imx"),
            "list" => vec![Value::Int32(10), Value::from("x"), Value::Boolean(true)],
            "nested" => doc! { "inner" => doc! { "deep" => Value::Null } },
            "nothing" => Value::Null,
        };

        assert_eq!(decode_document(&encode_document(&doc)).unwrap(), doc);
    }

    #[test]
    fn array_ignores_key_artifacts() {
        // keys deliberately out of order and duplicated
        let mut elements = Vec::new();
        for (key, value) in [("5", 10), ("5", 20), ("0", 30)] {
            elements.push(0x10);
            elements.extend_from_slice(key.as_bytes());
            elements.push(0);
            elements.extend_from_slice(&i32::to_le_bytes(value));
        }
        let array = envelope(&elements);

        let value = decode_value(ElementType::Array, &array).unwrap();
        assert_eq!(value, Value::from(vec![10, 20, 30]));
    }

    #[test]
    fn duplicate_fields_keep_last_value_at_end() {
        let mut elements = Vec::new();
        for (key, value) in [("a", 1), ("b", 2), ("a", 3)] {
            elements.push(0x10);
            elements.extend_from_slice(key.as_bytes());
            elements.push(0);
            elements.extend_from_slice(&i32::to_le_bytes(value));
        }

        let doc = decode_document(&envelope(&elements)).unwrap();
        assert_eq!(doc, doc! { "b" => 2, "a" => 3 });
    }

    #[test]
    fn truncated_input_is_an_error() {
        let bytes = name_and_age_bytes();
        let err = decode_document(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidLength(28)));

        let err = decode_document(&bytes[..2]).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof));
    }

    #[test]
    fn element_overrunning_its_document_is_an_error() {
        // int32 element announcing 4 bytes but only 2 present before the terminator
        let elements = [0x10, b'a', 0, 1, 2];
        let err = decode_document(&envelope(&elements)).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof));
    }

    #[test]
    fn rejects_bad_terminator_and_boolean() {
        let mut bytes = encode_document(&doc! { "a" => 1 });
        let last = bytes.len() - 1;
        bytes[last] = 7;
        assert!(matches!(
            decode_document(&bytes),
            Err(DecodeError::MissingTerminator)
        ));

        let bytes = envelope(&[0x08, b'b', 0, 2]);
        assert!(matches!(
            decode_document(&bytes),
            Err(DecodeError::InvalidBoolean(2))
        ));
    }

    #[test]
    fn trailing_bytes_are_reported() {
        let mut bytes = encode_document(&doc! { "a" => 1 });
        bytes.push(0xAA);
        assert!(matches!(
            decode_document(&bytes),
            Err(DecodeError::TrailingBytes(1))
        ));
    }

    #[test]
    fn unsupported_standard_types_decode_as_null() {
        let mut elements = vec![0x11, b't', 0];
        elements.extend_from_slice(&[1; 8]);
        elements.extend_from_slice(&[0x10, b'n', 0]);
        elements.extend_from_slice(&5_i32.to_le_bytes());

        let doc = decode_document(&envelope(&elements)).unwrap();
        assert_eq!(doc, doc! { "t" => Value::Null, "n" => 5 });
    }

    #[test]
    fn unknown_tag_nulls_field_and_keeps_earlier_ones() {
        let mut elements = vec![0x10, b'a', 0];
        elements.extend_from_slice(&1_i32.to_le_bytes());
        elements.extend_from_slice(&[0x42, b'x', 0, 9, 9, 9]);

        let doc = decode_document(&envelope(&elements)).unwrap();
        assert_eq!(doc, doc! { "a" => 1, "x" => Value::Null });
    }

    #[test]
    fn out_of_range_date_decodes_as_epoch() {
        let mut elements = vec![0x09, b'd', 0];
        elements.extend_from_slice(&i64::MAX.to_le_bytes());

        let doc = decode_document(&envelope(&elements)).unwrap();
        assert_eq!(doc.get("d"), Some(&Value::DateTime(DateTime::UNIX_EPOCH)));
    }

    /// `depth` documents, each holding the next under an empty name.
    fn nested(depth: usize) -> Vec<u8> {
        let mut bytes = encode_document(&Document::new());
        for _ in 0..depth {
            let mut elements = vec![0x03, 0];
            elements.extend_from_slice(&bytes);
            bytes = envelope(&elements);
        }
        bytes
    }

    #[test]
    fn nesting_limit() {
        assert!(decode_document(&nested(MAX_DEPTH - 1)).is_ok());
        assert!(matches!(
            decode_document(&nested(MAX_DEPTH)),
            Err(DecodeError::TooDeep(MAX_DEPTH))
        ));
    }

    #[test]
    fn deeply_nested_input_is_an_error() {
        // built outside-in so the test itself does not recurse
        let levels = 200_000;
        let mut bytes = Vec::with_capacity(levels * 7 + 5);
        for i in 0..levels {
            let len = ((levels - i) * 7 + 5) as i32;
            bytes.extend_from_slice(&len.to_le_bytes());
            bytes.extend_from_slice(&[0x03, 0]);
        }
        bytes.extend_from_slice(&5_i32.to_le_bytes());
        bytes.push(0);
        bytes.extend(std::iter::repeat_n(0, levels));

        assert!(matches!(
            decode_document(&bytes),
            Err(DecodeError::TooDeep(_))
        ));
    }

    #[test]
    fn oversized_stream_document_is_rejected_before_reading() {
        let mut reader = std::io::Cursor::new((MAX_DOCUMENT_LEN + 1).to_le_bytes().to_vec());
        assert!(matches!(
            read_document(&mut reader),
            Err(DecodeError::InvalidLength(len)) if len == MAX_DOCUMENT_LEN + 1
        ));
    }

    #[test]
    fn reads_documents_from_a_stream() {
        let mut bytes = name_and_age_bytes();
        bytes.extend(encode_document(&doc! { "next" => true }));
        let mut reader = std::io::Cursor::new(bytes);

        assert_eq!(
            read_document(&mut reader).unwrap(),
            doc! { "name" => "Bob", "age" => 41 }
        );
        assert_eq!(read_document(&mut reader).unwrap(), doc! { "next" => true });
        assert!(matches!(
            read_document(&mut reader),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
