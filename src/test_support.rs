//! Scripted in-memory server used by protocol tests.
use std::{
    collections::VecDeque,
    io::{self, Read, Write},
};

use crate::{
    document::Document,
    doc,
    protocol::{HEADER_LEN, MsgHeader, OpCode, Reply, ReplyFlags},
};

/// One canned answer, sent back for the next query or get-more.
#[derive(Debug, Clone)]
pub(crate) struct Scripted {
    pub cursor_id: i64,
    pub flags: ReplyFlags,
    pub documents: Vec<Document>,
}

impl Scripted {
    pub fn batch(cursor_id: i64, documents: Vec<Document>) -> Self {
        Self {
            cursor_id,
            flags: ReplyFlags::default(),
            documents,
        }
    }
}

/// Write or flush call seen by the [`MockServer`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IoEvent {
    Write(usize),
    Flush,
}

/// Duplex stream that parses every written frame, records it, and queues the next scripted
/// reply (addressed to the frame's request id) for reading.
#[derive(Debug, Default)]
pub(crate) struct MockServer {
    script: VecDeque<Scripted>,
    outbound: VecDeque<u8>,
    pending: Vec<u8>,
    pub requests: Vec<(MsgHeader, Vec<u8>)>,
    pub io: Vec<IoEvent>,
    pub fail_writes: bool,
    /// Offset added to the `response_to` of replies.
    pub misaddress: i32,
}

impl MockServer {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    pub fn count(&self, op: OpCode) -> usize {
        self.requests
            .iter()
            .filter(|(header, _)| header.op().ok() == Some(op))
            .count()
    }

    pub fn ops(&self) -> Vec<OpCode> {
        self.requests
            .iter()
            .filter_map(|(header, _)| header.op().ok())
            .collect()
    }

    fn drain_frames(&mut self) {
        while self.pending.len() >= HEADER_LEN {
            let header = MsgHeader::from_bytes(&self.pending[..HEADER_LEN]).unwrap();
            let len = header.message_length as usize;
            if self.pending.len() < len {
                break;
            }
            let frame: Vec<u8> = self.pending.drain(..len).collect();
            if matches!(header.op(), Ok(OpCode::Query | OpCode::GetMore)) {
                if let Some(scripted) = self.script.pop_front() {
                    let reply = reply_frame(header.request_id + self.misaddress, scripted);
                    self.outbound.extend(reply);
                }
            }
            self.requests.push((header, frame[HEADER_LEN..].to_vec()));
        }
    }
}

impl Read for MockServer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.outbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockServer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
        }
        self.io.push(IoEvent::Write(buf.len()));
        self.pending.extend_from_slice(buf);
        self.drain_frames();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.io.push(IoEvent::Flush);
        Ok(())
    }
}

pub(crate) fn reply_frame(response_to: i32, scripted: Scripted) -> Vec<u8> {
    Reply {
        header: MsgHeader::new(OpCode::Reply, 0, response_to, 0),
        flags: scripted.flags,
        cursor_id: scripted.cursor_id,
        starting_from: 0,
        documents: scripted.documents,
    }
    .to_bytes()
    .unwrap()
}

/// Documents `{n: start}`, `{n: start + 1}`, ...
pub(crate) fn numbered(start: i32, count: i32) -> Vec<Document> {
    (start..start + count).map(|n| doc! { "n" => n }).collect()
}
