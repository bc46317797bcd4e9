pub mod cli;
pub mod codec;
pub mod document;
pub mod protocol;
pub mod value;

#[cfg(test)]
mod test_support;

pub use document::Document;
pub use protocol::{
    Connection, CursorStream, Namespace, ProtocolError, Query, Reply, Request,
};
pub use value::{Binary, ElementType, Lookup, ObjectId, Regex, RegexOptions, Value, ValueError};
