//! Client side of the document-database wire protocol.
//!
//! This module defines the messages exchanged with the server, how they are framed on the wire,
//! and the [`Connection`] that sends them over any duplex byte stream.
//!
//! # Key Components
//!
//! - [`Request`]: Outgoing query, get-more, kill-cursors, insert, update and delete messages.
//! - [`Reply`]: The server's answer to a query or get-more.
//! - [`Connection`]: Sequential request/response exchange over a `Read + Write` stream.
//! - [`CursorStream`]: Paging through a server-side cursor until the result set or the
//!   requested count is exhausted.
//!
//! # Binary Format
//!
//! Every message begins with a fixed 16-byte header of four little-endian `i32` values:
//!
//! - total message length, header included;
//! - request id, assigned by the sender;
//! - response to, the request id a reply answers (0 for requests);
//! - operation code.
//!
//! The body follows, laid out according to the operation. Namespaces are terminator-style
//! strings of the form `database.collection`; documents use the [`codec`](crate::codec)
//! encoding.
mod cursor;
mod error;
mod header;
mod reply;
mod request;
mod transport;

pub use cursor::{Cursor, CursorStream};
pub use error::ProtocolError;
pub use header::{HEADER_LEN, MAX_MESSAGE_LEN, MsgHeader, OpCode};
pub use reply::{Reply, ReplyFlags};
pub use request::{Frame, Namespace, Query, QueryFlags, Request};
pub use transport::Connection;
