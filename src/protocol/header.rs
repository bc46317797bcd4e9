use std::io::Read;

use bincode::{
    Decode, Encode,
    config::{Configuration, Fixint, LittleEndian},
};

use super::ProtocolError;

pub const HEADER_LEN: usize = 16;

/// Largest message accepted from the server, header included.
pub const MAX_MESSAGE_LEN: i32 = 48 * 1024 * 1024;

/// Fixed-width little-endian integers, matching the hand-written parts of every body.
pub(crate) fn wire_config() -> Configuration<LittleEndian, Fixint> {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

/// Message kind carried in every header. The values are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OpCode {
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    GetMore = 2005,
    Delete = 2006,
    KillCursors = 2007,
}

impl From<OpCode> for i32 {
    fn from(op: OpCode) -> Self {
        op as i32
    }
}

impl TryFrom<i32> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => OpCode::Reply,
            2001 => OpCode::Update,
            2002 => OpCode::Insert,
            2004 => OpCode::Query,
            2005 => OpCode::GetMore,
            2006 => OpCode::Delete,
            2007 => OpCode::KillCursors,
            other => return Err(ProtocolError::UnknownOpCode(other)),
        })
    }
}

/// Sixteen byte header preceding every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct MsgHeader {
    /// Total message size, header included.
    pub message_length: i32,
    pub request_id: i32,
    /// Request id this message answers, 0 for fresh requests.
    pub response_to: i32,
    pub op_code: i32,
}

impl MsgHeader {
    pub fn new(op: OpCode, request_id: i32, response_to: i32, body_len: usize) -> Self {
        Self {
            message_length: (HEADER_LEN + body_len) as i32,
            request_id,
            response_to,
            op_code: op.into(),
        }
    }

    pub fn op(&self) -> Result<OpCode, ProtocolError> {
        self.op_code.try_into()
    }

    /// Body size announced by the header, bounded by [`MAX_MESSAGE_LEN`].
    pub fn body_len(&self) -> Result<usize, ProtocolError> {
        usize::try_from(self.message_length)
            .ok()
            .filter(|_| self.message_length <= MAX_MESSAGE_LEN)
            .and_then(|len| len.checked_sub(HEADER_LEN))
            .ok_or(ProtocolError::InvalidMessageLength(self.message_length))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(bincode::encode_to_vec(*self, wire_config())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (header, _) = bincode::decode_from_slice(bytes, wire_config())?;
        Ok(header)
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        let mut bytes = [0; HEADER_LEN];
        reader.read_exact(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}
