//! Cursor-based result streaming.
//!
//! The first reply to a query may carry only part of the result set together with a handle to
//! a server-side cursor. [`CursorStream`] drives the follow-up exchange:
//!
//! - **Initial**: only the query exists. The query is sent; if the reply has no cursor, or
//!   already satisfies the requested count, the stream is done.
//! - **Paging**: a cursor is open and more documents are wanted. Each get-more asks for the
//!   documents still missing. An empty batch, or a reply whose cursor id is 0, means the
//!   server is exhausted; a batch that reaches the requested count is truncated to it.
//! - **Done**: nothing more will be sent.
//!
//! Leaving Paging sends a kill-cursors message for the handle returned by the query, whether the
//! cursor was drained, satisfied or abandoned through [`CursorStream::close`] or drop. Only a
//! cursor the server reports as not found is dropped without one.
use std::{
    collections::VecDeque,
    io::{Read, Write},
    mem,
};

use log::{info, warn};

use crate::document::Document;

use super::{Connection, Namespace, ProtocolError, Query, Request};

/// Handle to an open server-side result iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// 0 means there is no server-side cursor.
    pub id: i64,
    pub namespace: Namespace,
    /// Size of the most recent batch.
    pub batch_size: i32,
}

impl Cursor {
    pub fn is_open(&self) -> bool {
        self.id != 0
    }
}

#[derive(Debug)]
enum State {
    Initial,
    Paging(Cursor),
    Done,
}

pub struct CursorStream<'c, T: Read + Write> {
    connection: &'c mut Connection<T>,
    query: Query,
    take: Option<usize>,
    state: State,
    collected: usize,
    buffer: VecDeque<Document>,
    deferred: Option<ProtocolError>,
}

impl<'c, T: Read + Write> CursorStream<'c, T> {
    /// Streams `query`, stopping after `take` documents when given.
    pub fn new(connection: &'c mut Connection<T>, query: Query, take: Option<usize>) -> Self {
        Self {
            connection,
            query,
            take,
            state: State::Initial,
            collected: 0,
            buffer: VecDeque::new(),
            deferred: None,
        }
    }

    /// The open server cursor, if any.
    pub fn cursor(&self) -> Option<&Cursor> {
        match &self.state {
            State::Paging(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Documents received so far, including those not yet handed out by the iterator.
    pub fn collected(&self) -> usize {
        self.collected
    }

    /// Fetches the next batch, `None` once the stream is done.
    pub fn next_batch(&mut self) -> Result<Option<Vec<Document>>, ProtocolError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        match mem::replace(&mut self.state, State::Done) {
            State::Initial => self.open().map(Some),
            State::Paging(cursor) => self.page(cursor).map(Some),
            State::Done => Ok(None),
        }
    }

    /// Drains the stream into a vector.
    pub fn collect_all(mut self) -> Result<Vec<Document>, ProtocolError> {
        let mut documents: Vec<Document> = self.buffer.drain(..).collect();
        while let Some(batch) = self.next_batch()? {
            documents.extend(batch);
        }
        Ok(documents)
    }

    /// Stops reading, killing the server cursor if one is still open.
    pub fn close(mut self) -> Result<(), ProtocolError> {
        if let State::Paging(cursor) = mem::replace(&mut self.state, State::Done) {
            self.kill(&cursor)?;
        }
        match self.deferred.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn open(&mut self) -> Result<Vec<Document>, ProtocolError> {
        if self.remaining() == Some(0) {
            return Ok(Vec::new());
        }
        let mut query = self.query.clone();
        if let Some(take) = self.take {
            query.limit = clamp(take);
        }

        let reply = self.connection.request(&Request::Query(query))?;
        let cursor = Cursor {
            id: reply.cursor_id,
            namespace: self.query.namespace.clone(),
            batch_size: reply.documents.len() as i32,
        };
        let batch = self.accept(reply.documents);

        if cursor.is_open() {
            if self.remaining() == Some(0) {
                self.release(&cursor);
            } else {
                info!("cursor {} opened on {}", cursor.id, cursor.namespace);
                self.state = State::Paging(cursor);
            }
        }
        Ok(batch)
    }

    fn page(&mut self, mut cursor: Cursor) -> Result<Vec<Document>, ProtocolError> {
        let request = Request::GetMore {
            namespace: cursor.namespace.clone(),
            batch_size: self.remaining().map_or(0, clamp),
            cursor_id: cursor.id,
        };
        let reply = match self.connection.request(&request) {
            Ok(reply) => reply,
            Err(err @ ProtocolError::CursorNotFound(_)) => return Err(err),
            Err(err) => {
                if self.connection.is_open() {
                    self.release(&cursor);
                }
                return Err(err);
            }
        };

        if reply.documents.is_empty() {
            self.release(&cursor);
            return Ok(Vec::new());
        }
        cursor.batch_size = reply.documents.len() as i32;
        let batch = self.accept(reply.documents);

        if reply.cursor_id == 0 || self.remaining() == Some(0) {
            self.release(&cursor);
        } else {
            self.state = State::Paging(cursor);
        }
        Ok(batch)
    }

    fn remaining(&self) -> Option<usize> {
        self.take.map(|take| take.saturating_sub(self.collected))
    }

    /// Keeps at most the remaining wanted documents of a batch.
    fn accept(&mut self, mut documents: Vec<Document>) -> Vec<Document> {
        if let Some(remaining) = self.remaining() {
            documents.truncate(remaining);
        }
        self.collected += documents.len();
        documents
    }

    /// Kills the cursor, deferring a failure to the next call so the current batch survives.
    fn release(&mut self, cursor: &Cursor) {
        if let Err(err) = self.kill(cursor) {
            warn!("failed to kill cursor {}: {err}", cursor.id);
            self.deferred = Some(err);
        }
    }

    fn kill(&mut self, cursor: &Cursor) -> Result<(), ProtocolError> {
        info!("killing cursor {} on {}", cursor.id, cursor.namespace);
        self.connection.post(&Request::KillCursors {
            cursor_ids: vec![cursor.id],
        })
    }
}

impl<T: Read + Write> Iterator for CursorStream<'_, T> {
    type Item = Result<Document, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(document) = self.buffer.pop_front() {
                return Some(Ok(document));
            }
            match self.next_batch() {
                Ok(Some(batch)) => self.buffer.extend(batch),
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl<T: Read + Write> Drop for CursorStream<'_, T> {
    fn drop(&mut self) {
        if let State::Paging(cursor) = mem::replace(&mut self.state, State::Done) {
            if let Err(err) = self.kill(&cursor) {
                warn!("failed to kill abandoned cursor {}: {err}", cursor.id);
            }
        }
    }
}

fn clamp(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use crate::{
        doc,
        protocol::OpCode,
        test_support::{MockServer, Scripted, numbered},
    };

    use super::*;

    fn query() -> Query {
        Query::new(Namespace::new("app", "people"), doc! {})
    }

    fn connection(script: Vec<Scripted>) -> Connection<MockServer> {
        Connection::new(MockServer::new(script))
    }

    fn server(connection: &Connection<MockServer>) -> &MockServer {
        connection.get_ref().unwrap()
    }

    #[test]
    fn pages_until_server_is_exhausted() {
        let mut conn = connection(vec![
            Scripted::batch(42, numbered(0, 3)),
            Scripted::batch(42, numbered(3, 3)),
            Scripted::batch(42, numbered(6, 2)),
            Scripted::batch(42, vec![]),
        ]);

        let documents = conn.find(query(), Some(10)).unwrap();

        assert_eq!(documents, numbered(0, 8));
        let server = server(&conn);
        assert_eq!(server.count(OpCode::GetMore), 3);
        assert_eq!(server.count(OpCode::KillCursors), 1);
        assert_eq!(server.ops().last(), Some(&OpCode::KillCursors));
    }

    #[test]
    fn no_cursor_means_no_follow_up() {
        let mut conn = connection(vec![Scripted::batch(0, numbered(0, 4))]);

        let documents = conn.find(query(), Some(10)).unwrap();

        assert_eq!(documents.len(), 4);
        assert_eq!(server(&conn).ops(), vec![OpCode::Query]);
    }

    #[test]
    fn get_more_requests_the_remainder() {
        let mut conn = connection(vec![
            Scripted::batch(9, numbered(0, 3)),
            Scripted::batch(9, numbered(3, 2)),
            Scripted::batch(9, numbered(5, 5)),
        ]);

        conn.find(query(), Some(10)).unwrap();

        let batch_sizes: Vec<i32> = server(&conn)
            .requests
            .iter()
            .filter(|(header, _)| header.op().ok() == Some(OpCode::GetMore))
            .map(|(_, body)| {
                let at = body.len() - 12;
                i32::from_le_bytes(body[at..at + 4].try_into().unwrap())
            })
            .collect();
        assert_eq!(batch_sizes, vec![7, 5]);
    }

    #[test]
    fn oversized_batch_is_truncated_and_killed() {
        let mut conn = connection(vec![
            Scripted::batch(5, numbered(0, 2)),
            Scripted::batch(5, numbered(2, 6)),
        ]);

        let documents = conn.find(query(), Some(4)).unwrap();

        assert_eq!(documents, numbered(0, 4));
        assert_eq!(server(&conn).count(OpCode::KillCursors), 1);
    }

    #[test]
    fn first_batch_satisfying_take_kills_cursor() {
        let mut conn = connection(vec![Scripted::batch(5, numbered(0, 5))]);

        let documents = conn.find(query(), Some(3)).unwrap();

        assert_eq!(documents, numbered(0, 3));
        assert_eq!(
            server(&conn).ops(),
            vec![OpCode::Query, OpCode::KillCursors]
        );
    }

    #[test]
    fn cursor_closed_by_server_is_still_killed() {
        let mut conn = connection(vec![
            Scripted::batch(42, numbered(0, 3)),
            Scripted::batch(42, numbered(3, 3)),
            Scripted::batch(0, numbered(6, 2)),
        ]);

        let documents = conn.find(query(), Some(10)).unwrap();

        assert_eq!(documents, numbered(0, 8));
        let server = server(&conn);
        assert_eq!(
            server.ops(),
            vec![
                OpCode::Query,
                OpCode::GetMore,
                OpCode::GetMore,
                OpCode::KillCursors
            ]
        );
        let (_, body) = server.requests.last().unwrap();
        assert_eq!(body[8..], 42_i64.to_le_bytes());
    }

    #[test]
    fn unbounded_stream_lets_server_choose_batch_size() {
        let mut conn = connection(vec![
            Scripted::batch(8, numbered(0, 1)),
            Scripted::batch(8, numbered(1, 1)),
            Scripted::batch(8, vec![]),
        ]);

        assert_eq!(conn.find(query(), None).unwrap().len(), 2);

        let (_, body) = &server(&conn).requests[1];
        let at = body.len() - 12;
        assert_eq!(body[at..at + 4], 0_i32.to_le_bytes());
    }

    #[test]
    fn closing_early_kills_cursor() {
        let mut conn = connection(vec![Scripted::batch(17, numbered(0, 2))]);

        let mut stream = conn.stream(query(), None);
        assert_eq!(stream.next_batch().unwrap(), Some(numbered(0, 2)));
        assert_eq!(stream.cursor().map(|c| c.id), Some(17));
        stream.close().unwrap();

        let server = server(&conn);
        assert_eq!(server.ops(), vec![OpCode::Query, OpCode::KillCursors]);
        let (_, body) = server.requests.last().unwrap();
        assert_eq!(body[8..], 17_i64.to_le_bytes());
    }

    #[test]
    fn dropping_early_kills_cursor() {
        let mut conn = connection(vec![Scripted::batch(17, numbered(0, 2))]);

        {
            let mut stream = conn.stream(query(), None);
            assert!(stream.next().unwrap().is_ok());
        }

        assert_eq!(server(&conn).count(OpCode::KillCursors), 1);
    }

    #[test]
    fn iterator_preserves_server_order() {
        let mut conn = connection(vec![
            Scripted::batch(3, numbered(0, 2)),
            Scripted::batch(3, numbered(2, 2)),
            Scripted::batch(3, vec![]),
        ]);

        let ns: Vec<i32> = conn
            .stream(query(), None)
            .map(|doc| doc.unwrap().get_or("n", -1))
            .collect();
        assert_eq!(ns, vec![0, 1, 2, 3]);
    }

    #[test]
    fn zero_take_sends_nothing() {
        let mut conn = connection(vec![]);

        assert!(conn.find(query(), Some(0)).unwrap().is_empty());
        assert!(server(&conn).requests.is_empty());
    }

    #[test]
    fn cursor_not_found_is_not_killed() {
        let mut lost = Scripted::batch(4, vec![]);
        lost.flags = crate::protocol::ReplyFlags::CURSOR_NOT_FOUND;
        let mut conn = connection(vec![Scripted::batch(4, numbered(0, 1)), lost]);

        let err = conn.find(query(), None).unwrap_err();

        assert!(matches!(err, ProtocolError::CursorNotFound(4)));
        assert!(conn.is_open());
        assert_eq!(server(&conn).count(OpCode::KillCursors), 0);
    }

    #[test]
    fn server_error_while_paging_still_kills() {
        let mut conn = connection(vec![
            Scripted::batch(4, numbered(0, 1)),
            Scripted::batch(4, vec![doc! { "errmsg" => "interrupted" }]),
        ]);

        let err = conn.find(query(), None).unwrap_err();

        assert!(matches!(err, ProtocolError::Server { .. }));
        assert_eq!(server(&conn).count(OpCode::KillCursors), 1);
    }

    #[test]
    fn query_asks_for_take() {
        let mut conn = connection(vec![Scripted::batch(0, vec![])]);
        conn.find(query(), Some(25)).unwrap();

        let (_, body) = &server(&conn).requests[0];
        // flags, "app.people\0", skip, number to return
        let at = 4 + 11 + 4;
        assert_eq!(body[at..at + 4], 25_i32.to_le_bytes());
    }
}
