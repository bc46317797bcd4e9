use std::{fmt, ops::BitOr};

use crate::{
    codec::{write_cstring, write_document},
    document::Document,
    value::Value,
};

use super::{MsgHeader, OpCode, ProtocolError};

/// `database.collection` target of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Splits on the first dot; collection names may themselves contain dots.
    pub fn parse(full_name: &str) -> Option<Self> {
        let (database, collection) = full_name.split_once('.')?;
        if database.is_empty() || collection.is_empty() {
            return None;
        }
        Some(Self::new(database, collection))
    }

    /// The pseudo collection commands are sent to.
    pub fn command(database: impl Into<String>) -> Self {
        Self::new(database, "$cmd")
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Option bits of a query message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFlags(i32);

impl QueryFlags {
    pub const NONE: Self = Self(0);
    pub const TAILABLE: Self = Self(1 << 1);
    pub const SLAVE_OK: Self = Self(1 << 2);
    pub const NO_CURSOR_TIMEOUT: Self = Self(1 << 4);
    pub const AWAIT_DATA: Self = Self(1 << 5);
    pub const EXHAUST: Self = Self(1 << 6);
    pub const PARTIAL: Self = Self(1 << 7);

    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for QueryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A find request: filter plus optional projection, ordering and paging.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub namespace: Namespace,
    pub flags: QueryFlags,
    pub skip: i32,
    /// Number of documents to return; zero or negative means no limit.
    pub limit: i32,
    pub filter: Document,
    pub projection: Option<Vec<String>>,
    pub sort: Option<Document>,
}

impl Query {
    pub fn new(namespace: Namespace, filter: Document) -> Self {
        Self {
            namespace,
            flags: QueryFlags::NONE,
            skip: 0,
            limit: 0,
            filter,
            projection: None,
            sort: None,
        }
    }

    pub fn flags(mut self, flags: QueryFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn skip(mut self, skip: i32) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts returned documents to the given fields.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn number_to_return(&self) -> i32 {
        if self.limit <= 0 { i32::MAX } else { self.limit }
    }

    /// The filter as sent: wrapped in `$query`/`$orderby` when an ordering was requested.
    pub fn selector(&self) -> Document {
        match &self.sort {
            Some(sort) => {
                let mut wrapped = Document::new();
                wrapped.insert("$query", self.filter.clone());
                wrapped.insert("$orderby", sort.clone());
                wrapped
            }
            None => self.filter.clone(),
        }
    }

    pub fn projection_document(&self) -> Option<Document> {
        self.projection
            .as_ref()
            .map(|fields| fields.iter().map(|name| (name.as_str(), Value::Int32(1))).collect())
    }
}

/// Outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Query(Query),
    GetMore {
        namespace: Namespace,
        batch_size: i32,
        cursor_id: i64,
    },
    KillCursors {
        cursor_ids: Vec<i64>,
    },
    Insert {
        namespace: Namespace,
        documents: Vec<Document>,
        continue_on_error: bool,
    },
    Update {
        namespace: Namespace,
        selector: Document,
        update: Document,
        upsert: bool,
        multi: bool,
    },
    Delete {
        namespace: Namespace,
        selector: Document,
        single: bool,
    },
}

/// A header plus the body it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: MsgHeader,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = self.header.to_bytes()?;
        bytes.extend_from_slice(&self.body);
        Ok(bytes)
    }
}

impl Request {
    pub fn op_code(&self) -> OpCode {
        match self {
            Request::Query(_) => OpCode::Query,
            Request::GetMore { .. } => OpCode::GetMore,
            Request::KillCursors { .. } => OpCode::KillCursors,
            Request::Insert { .. } => OpCode::Insert,
            Request::Update { .. } => OpCode::Update,
            Request::Delete { .. } => OpCode::Delete,
        }
    }

    /// Only queries and get-mores are answered by the server.
    pub fn expects_reply(&self) -> bool {
        matches!(self, Request::Query(_) | Request::GetMore { .. })
    }

    /// Builds the framed message. The body is generated on every call and the header is
    /// derived from it afterwards, so repeated calls never share stale bytes.
    pub fn frame(&self, request_id: i32) -> Frame {
        let body = self.body();
        Frame {
            header: MsgHeader::new(self.op_code(), request_id, 0, body.len()),
            body,
        }
    }

    pub fn body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Request::Query(query) => {
                put_i32(&mut buf, query.flags.bits());
                write_cstring(&mut buf, &query.namespace.to_string());
                put_i32(&mut buf, query.skip);
                put_i32(&mut buf, query.number_to_return());
                write_document(&mut buf, &query.selector());
                if let Some(projection) = query.projection_document() {
                    write_document(&mut buf, &projection);
                }
            }
            Request::GetMore {
                namespace,
                batch_size,
                cursor_id,
            } => {
                put_i32(&mut buf, 0);
                write_cstring(&mut buf, &namespace.to_string());
                put_i32(&mut buf, *batch_size);
                buf.extend_from_slice(&cursor_id.to_le_bytes());
            }
            Request::KillCursors { cursor_ids } => {
                put_i32(&mut buf, 0);
                put_i32(&mut buf, cursor_ids.len() as i32);
                for id in cursor_ids {
                    buf.extend_from_slice(&id.to_le_bytes());
                }
            }
            Request::Insert {
                namespace,
                documents,
                continue_on_error,
            } => {
                put_i32(&mut buf, i32::from(*continue_on_error));
                write_cstring(&mut buf, &namespace.to_string());
                for doc in documents {
                    write_document(&mut buf, doc);
                }
            }
            Request::Update {
                namespace,
                selector,
                update,
                upsert,
                multi,
            } => {
                put_i32(&mut buf, 0);
                write_cstring(&mut buf, &namespace.to_string());
                put_i32(&mut buf, i32::from(*upsert) | i32::from(*multi) << 1);
                write_document(&mut buf, selector);
                write_document(&mut buf, update);
            }
            Request::Delete {
                namespace,
                selector,
                single,
            } => {
                put_i32(&mut buf, 0);
                write_cstring(&mut buf, &namespace.to_string());
                put_i32(&mut buf, i32::from(*single));
                write_document(&mut buf, selector);
            }
        }
        buf
    }
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}
