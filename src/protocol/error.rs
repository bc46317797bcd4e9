use std::io;

use thiserror::Error;

use crate::codec::DecodeError;

use super::OpCode;

/// Failures while exchanging messages with the server.
///
/// Transport and protocol faults leave the connection in an unknown state and cause it to be
/// torn down; server faults are well-formed replies and leave it usable.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode frame: {0}")]
    Frame(#[from] bincode::error::DecodeError),

    #[error("failed to decode document: {0}")]
    Decode(#[from] DecodeError),

    #[error("unknown opcode {0}")]
    UnknownOpCode(i32),

    #[error("expected a reply, received {0:?}")]
    UnexpectedOpCode(OpCode),

    #[error("{0:?} messages receive no reply")]
    NoReply(OpCode),

    #[error("invalid message length {0}")]
    InvalidMessageLength(i32),

    #[error("invalid document count {0}")]
    InvalidDocumentCount(i32),

    #[error("reply length mismatch: body holds {announced} bytes, parsed {parsed}")]
    LengthMismatch { announced: usize, parsed: usize },

    #[error("received reply to request {actual} while waiting on {expected}")]
    ResponseMismatch { expected: i32, actual: i32 },

    #[error("server error: {message}")]
    Server { message: String, code: Option<i32> },

    #[error("cursor {0} not found on server")]
    CursorNotFound(i64),

    #[error("reply carried no documents")]
    EmptyReply,

    #[error("connection closed")]
    ConnectionClosed,
}

impl ProtocolError {
    /// Whether the error came from the server rather than the transport or the framing.
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            ProtocolError::Server { .. } | ProtocolError::CursorNotFound(_) | ProtocolError::EmptyReply
        )
    }

    /// Whether the connection can no longer be trusted after this error.
    pub(crate) fn is_fatal(&self) -> bool {
        !self.is_server_fault() && !matches!(self, ProtocolError::NoReply(_))
    }
}
