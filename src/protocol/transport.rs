use std::io::{Read, Write};

use log::{debug, trace, warn};

use crate::document::Document;

use super::{CursorStream, Namespace, ProtocolError, Query, Reply, Request};

/// Exclusive owner of one duplex stream to the server.
///
/// Requests are strictly sequential: a request is written, then its reply is read in full
/// before anything else is sent. Concurrent callers must serialize access themselves or use
/// separate connections. Any transport or framing failure drops the stream, and every later
/// call fails with [`ProtocolError::ConnectionClosed`]; reconnecting is up to the caller.
pub struct Connection<T: Read + Write> {
    stream: Option<T>,
    next_request_id: i32,
}

impl<T: Read + Write> Connection<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream: Some(stream),
            next_request_id: 1,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn get_ref(&self) -> Option<&T> {
        self.stream.as_ref()
    }

    /// Releases the stream, leaving the connection closed.
    pub fn close(&mut self) -> Option<T> {
        self.stream.take()
    }

    pub fn into_inner(self) -> Option<T> {
        self.stream
    }

    /// Writes a request, header and body flushed separately. Returns the request id.
    pub fn send(&mut self, request: &Request) -> Result<i32, ProtocolError> {
        let request_id = self.allocate_request_id();
        let frame = request.frame(request_id);
        let header = frame.header.to_bytes()?;
        debug!(
            "sending {:?} request {request_id} ({} bytes)",
            request.op_code(),
            frame.header.message_length
        );

        let result = self.io().and_then(|stream| {
            stream.write_all(&header)?;
            stream.flush()?;
            stream.write_all(&frame.body)?;
            stream.flush()?;
            Ok(())
        });
        self.guard(result)?;
        Ok(request_id)
    }

    /// Reads the reply to `request_id`.
    pub fn receive(&mut self, request_id: i32) -> Result<Reply, ProtocolError> {
        let result = self.io().and_then(|stream| {
            let reply = Reply::read(stream)?;
            if reply.header.response_to != request_id {
                return Err(ProtocolError::ResponseMismatch {
                    expected: request_id,
                    actual: reply.header.response_to,
                });
            }
            Ok(reply)
        });
        let reply = self.guard(result)?;
        trace!("request {request_id} answered with {} documents", reply.documents.len());
        Ok(reply)
    }

    /// Sends a request and waits for its reply.
    pub fn request(&mut self, request: &Request) -> Result<Reply, ProtocolError> {
        if !request.expects_reply() {
            return Err(ProtocolError::NoReply(request.op_code()));
        }
        let request_id = self.send(request)?;
        self.receive(request_id)
    }

    /// Sends a request the server does not answer.
    pub fn post(&mut self, request: &Request) -> Result<(), ProtocolError> {
        self.send(request).map(|_| ())
    }

    pub fn insert(
        &mut self,
        namespace: &Namespace,
        documents: Vec<Document>,
    ) -> Result<(), ProtocolError> {
        self.post(&Request::Insert {
            namespace: namespace.clone(),
            documents,
            continue_on_error: false,
        })
    }

    pub fn update(
        &mut self,
        namespace: &Namespace,
        selector: Document,
        update: Document,
        upsert: bool,
        multi: bool,
    ) -> Result<(), ProtocolError> {
        self.post(&Request::Update {
            namespace: namespace.clone(),
            selector,
            update,
            upsert,
            multi,
        })
    }

    pub fn delete(
        &mut self,
        namespace: &Namespace,
        selector: Document,
        single: bool,
    ) -> Result<(), ProtocolError> {
        self.post(&Request::Delete {
            namespace: namespace.clone(),
            selector,
            single,
        })
    }

    /// Runs a database command and returns its single result document.
    pub fn command(
        &mut self,
        database: &str,
        command: Document,
    ) -> Result<Document, ProtocolError> {
        let query = Query::new(Namespace::command(database), command).limit(1);
        let reply = self.request(&Request::Query(query))?;
        reply
            .documents
            .into_iter()
            .next()
            .ok_or(ProtocolError::EmptyReply)
    }

    /// Streams the results of `query`, stopping after `take` documents when given.
    pub fn stream(&mut self, query: Query, take: Option<usize>) -> CursorStream<'_, T> {
        CursorStream::new(self, query, take)
    }

    /// Collects the results of `query`, paging through the server cursor as needed.
    pub fn find(
        &mut self,
        query: Query,
        take: Option<usize>,
    ) -> Result<Vec<Document>, ProtocolError> {
        self.stream(query, take).collect_all()
    }

    fn io(&mut self) -> Result<&mut T, ProtocolError> {
        self.stream.as_mut().ok_or(ProtocolError::ConnectionClosed)
    }

    fn allocate_request_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = match id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        id
    }

    /// Tears the connection down when `result` carries a transport or protocol fault.
    fn guard<V>(&mut self, result: Result<V, ProtocolError>) -> Result<V, ProtocolError> {
        if let Err(err) = &result {
            if err.is_fatal() && self.stream.take().is_some() {
                warn!("closing connection after failure: {err}");
            }
        }
        result
    }
}
