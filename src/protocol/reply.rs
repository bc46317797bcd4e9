use std::io::Read;

use bincode::{Decode, Encode};
use log::{debug, trace};

use crate::{codec::Decoder, document::Document, value::Value};

use super::{HEADER_LEN, MsgHeader, OpCode, ProtocolError, header::wire_config};

const PREFIX_LEN: usize = 20;

/// Fixed fields at the start of every reply body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
struct ReplyPrefix {
    response_flags: i32,
    cursor_id: i64,
    starting_from: i32,
    number_returned: i32,
}

/// Status bits of a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyFlags(i32);

impl ReplyFlags {
    pub const CURSOR_NOT_FOUND: Self = Self(1);
    pub const QUERY_FAILURE: Self = Self(1 << 1);
    pub const AWAIT_CAPABLE: Self = Self(1 << 3);

    pub fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A parsed server reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub header: MsgHeader,
    pub flags: ReplyFlags,
    /// Open server cursor, 0 when the result set is complete.
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl Reply {
    /// Reads one reply message, consuming exactly the bytes its header announces.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        let header = MsgHeader::read(reader)?;
        let op = header.op()?;
        if op != OpCode::Reply {
            return Err(ProtocolError::UnexpectedOpCode(op));
        }
        let body_len = header.body_len()?;
        if body_len < PREFIX_LEN {
            return Err(ProtocolError::InvalidMessageLength(header.message_length));
        }

        let mut body = vec![0; body_len];
        reader.read_exact(&mut body)?;
        trace!("read reply body of {body_len} bytes");
        Self::parse(header, &body)
    }

    /// Parses a reply body.
    ///
    /// Documents are decoded one at a time; the first one carrying an `errmsg` (or `$err`)
    /// field turns the whole reply into [`ProtocolError::Server`].
    pub fn parse(header: MsgHeader, body: &[u8]) -> Result<Self, ProtocolError> {
        let (prefix, consumed): (ReplyPrefix, usize) =
            bincode::decode_from_slice(body, wire_config())?;
        debug!(
            "reply to {}: cursor {}, {} documents",
            header.response_to, prefix.cursor_id, prefix.number_returned
        );

        let flags = ReplyFlags::from_bits(prefix.response_flags);
        if flags.contains(ReplyFlags::CURSOR_NOT_FOUND) {
            return Err(ProtocolError::CursorNotFound(prefix.cursor_id));
        }
        let count = usize::try_from(prefix.number_returned)
            .map_err(|_| ProtocolError::InvalidDocumentCount(prefix.number_returned))?;

        let mut decoder = Decoder::new(&body[consumed..]);
        let mut documents = Vec::with_capacity(count.min(decoder.remaining() / 5));
        for _ in 0..count {
            let document = decoder.document()?;
            if let Some(err) = server_error(&document) {
                return Err(err);
            }
            documents.push(document);
        }
        if !decoder.is_empty() {
            return Err(ProtocolError::LengthMismatch {
                announced: body.len(),
                parsed: consumed + decoder.position(),
            });
        }

        Ok(Self {
            header,
            flags,
            cursor_id: prefix.cursor_id,
            starting_from: prefix.starting_from,
            documents,
        })
    }

    /// Serializes a reply, the inverse of [`Reply::read`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let prefix = ReplyPrefix {
            response_flags: self.flags.bits(),
            cursor_id: self.cursor_id,
            starting_from: self.starting_from,
            number_returned: self.documents.len() as i32,
        };
        let mut body = bincode::encode_to_vec(prefix, wire_config())?;
        for doc in &self.documents {
            body.extend(doc.to_bytes());
        }

        let header = MsgHeader {
            message_length: (HEADER_LEN + body.len()) as i32,
            ..self.header
        };
        let mut bytes = header.to_bytes()?;
        bytes.extend(body);
        Ok(bytes)
    }
}

fn server_error(document: &Document) -> Option<ProtocolError> {
    let message = document.get("errmsg").or_else(|| document.get("$err"))?;
    let message = match message {
        Value::String(s) => s.clone(),
        other => other.to_json().to_string(),
    };
    Some(ProtocolError::Server {
        message,
        code: document.get_as::<i32>("code").found(),
    })
}
