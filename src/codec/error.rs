use std::io;

use thiserror::Error;

/// Malformed or truncated wire bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid length prefix {0}")]
    InvalidLength(i32),

    #[error("missing terminator byte")]
    MissingTerminator,

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("invalid boolean byte 0x{0:02x}")]
    InvalidBoolean(u8),

    #[error("documents nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("{0} trailing bytes after document")]
    TrailingBytes(usize),

    #[error("failed to read document: {0}")]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::UnexpectedEof,
            _ => DecodeError::Io(err),
        }
    }
}
