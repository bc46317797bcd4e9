//! Binary document codec.
//!
//! Stateless translation between [`Value`](crate::value::Value) /
//! [`Document`](crate::document::Document) and the wire representation. All integers are
//! little-endian.
//!
//! # Layout
//!
//! A document is `[int32 total length][element]*[0x00]`, the length counting itself and the
//! trailing terminator. Each element is `[type tag][field name][payload]`, where the field name
//! is a terminator-style string (UTF-8 followed by a single `0x00`). Payloads:
//!
//! | Type     | Payload                                                   |
//! |----------|-----------------------------------------------------------|
//! | Int32    | 4 bytes                                                   |
//! | Int64    | 8 bytes                                                   |
//! | Double   | 8 bytes IEEE-754                                          |
//! | Boolean  | 1 byte, 0 or 1                                            |
//! | String   | int32 byte length (terminator included), UTF-8, `0x00`    |
//! | ObjectId | 12 raw bytes                                              |
//! | Binary   | int32 length, subtype byte, raw bytes                     |
//! | DateTime | int64 milliseconds since the Unix epoch                   |
//! | Regex    | pattern and option flags, both terminator-style           |
//! | Array    | a document keyed `"0"`, `"1"`, ...                        |
//! | Document | nested document                                           |
//! | Null     | nothing                                                   |
//!
//! # Degradation
//!
//! Element types outside the supported set decode as null. For the standard types whose size is
//! known the payload is skipped and decoding continues; for a completely unknown tag the rest of
//! the enclosing document is skipped, since its boundary is still known from the length prefix.
//!
//! Nesting deeper than [`MAX_DEPTH`] and stream documents larger than [`MAX_DOCUMENT_LEN`] are
//! rejected as malformed.
mod decoder;
mod encoder;
mod error;

pub use decoder::{
    Decoder, MAX_DEPTH, MAX_DOCUMENT_LEN, decode_document, decode_value, read_document,
};
pub use encoder::{
    encode_document, encode_value, write_cstring, write_document, write_element, write_string,
    write_value,
};
pub use error::DecodeError;
