// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Buffered bi-directional communication on top of blocking streams, with
//! client and server halves for request/reply protocols. A `Session` owns the
//! stream and its read and write buffers; `ClientSession` and `ServerSession`
//! layer a parser and composer on top.

use bytes::Buf;
use bytes::BytesMut;
use metriken::{metric, Counter, Gauge};
use protocol_common::{Compose, Parse, ParseError};

use std::io::{Error, ErrorKind, Read, Result, Write};
use std::marker::PhantomData;
use std::net::TcpStream;

#[metric(name = "session_recv", description = "number of reads from sessions")]
pub static SESSION_RECV: Counter = Counter::new();

#[metric(name = "session_recv_byte", description = "number of bytes read from sessions")]
pub static SESSION_RECV_BYTE: Counter = Counter::new();

#[metric(name = "session_send", description = "number of writes to sessions")]
pub static SESSION_SEND: Counter = Counter::new();

#[metric(name = "session_send_byte", description = "number of bytes written to sessions")]
pub static SESSION_SEND_BYTE: Counter = Counter::new();

#[metric(
    name = "session_buffer_byte",
    description = "current size of the session buffers in bytes"
)]
pub static SESSION_BUFFER_BYTE: Gauge = Gauge::new();

// the target size for a single read from the stream
const TARGET_READ_SIZE: usize = 16 * 1024;

/// A stream with read and write buffers.
pub struct Session {
    stream: TcpStream,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
}

impl Session {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buffer: BytesMut::with_capacity(TARGET_READ_SIZE),
            write_buffer: BytesMut::with_capacity(TARGET_READ_SIZE),
        }
    }

    pub fn peer_addr(&self) -> Result<std::net::SocketAddr> {
        self.stream.peer_addr()
    }

    /// Performs a single read from the underlying stream, appending to the
    /// read buffer. `Ok(0)` indicates the remote side closed the stream.
    pub fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; TARGET_READ_SIZE];
        let n = self.stream.read(&mut chunk)?;
        if n > 0 {
            SESSION_RECV.increment();
            SESSION_RECV_BYTE.add(n as u64);
            SESSION_BUFFER_BYTE.add(n as i64);
            self.read_buffer.extend_from_slice(&chunk[..n]);
        }
        Ok(n)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.read_buffer
    }

    pub fn consume(&mut self, amount: usize) {
        SESSION_BUFFER_BYTE.sub(amount as i64);
        self.read_buffer.advance(amount);
    }

    pub fn write_buffer(&mut self) -> &mut BytesMut {
        &mut self.write_buffer
    }

    /// Writes the entire write buffer to the stream and flushes it.
    pub fn flush(&mut self) -> Result<()> {
        if !self.write_buffer.is_empty() {
            SESSION_SEND.increment();
            SESSION_SEND_BYTE.add(self.write_buffer.len() as u64);
            self.stream.write_all(&self.write_buffer)?;
            self.write_buffer.clear();
        }
        self.stream.flush()
    }
}

/// The client side of a framed session: composes outgoing messages and
/// parses replies, blocking until a complete reply has been received.
pub struct ClientSession<Parser, Tx, Rx> {
    session: Session,
    parser: Parser,
    _tx: PhantomData<Tx>,
    _rx: PhantomData<Rx>,
}

impl<Parser, Tx, Rx> ClientSession<Parser, Tx, Rx>
where
    Tx: Compose,
    Parser: Parse<Rx>,
{
    pub fn new(session: Session, parser: Parser) -> Self {
        Self {
            session,
            parser,
            _tx: PhantomData,
            _rx: PhantomData,
        }
    }

    /// Sends a message and flushes the session buffer.
    pub fn send(&mut self, tx: &Tx) -> Result<usize> {
        let size = tx.compose(self.session.write_buffer());
        self.session.flush()?;
        Ok(size)
    }

    /// Blocks until a complete message has been received and returns it.
    pub fn receive(&mut self) -> Result<Rx> {
        loop {
            match self.parser.parse(self.session.buffer()) {
                Ok(parsed) => {
                    let consumed = parsed.consumed();
                    let message = parsed.into_inner();
                    self.session.consume(consumed);
                    return Ok(message);
                }
                Err(ParseError::Incomplete) => {
                    if self.session.fill()? == 0 {
                        return Err(Error::new(
                            ErrorKind::UnexpectedEof,
                            "stream closed mid-message",
                        ));
                    }
                }
                Err(ParseError::Invalid) => {
                    return Err(Error::new(ErrorKind::InvalidData, "invalid message"));
                }
            }
        }
    }
}

/// The server side of a framed session: parses incoming requests and
/// composes replies.
pub struct ServerSession<Parser, Rx, Tx> {
    session: Session,
    parser: Parser,
    _rx: PhantomData<Rx>,
    _tx: PhantomData<Tx>,
}

impl<Parser, Rx, Tx> ServerSession<Parser, Rx, Tx>
where
    Tx: Compose,
    Parser: Parse<Rx>,
{
    pub fn new(session: Session, parser: Parser) -> Self {
        Self {
            session,
            parser,
            _rx: PhantomData,
            _tx: PhantomData,
        }
    }

    pub fn peer_addr(&self) -> Result<std::net::SocketAddr> {
        self.session.peer_addr()
    }

    /// Blocks until a complete request has been received. `Ok(None)` means
    /// the remote side closed the stream cleanly between requests.
    pub fn receive(&mut self) -> Result<Option<Rx>> {
        loop {
            if !self.session.buffer().is_empty() {
                match self.parser.parse(self.session.buffer()) {
                    Ok(parsed) => {
                        let consumed = parsed.consumed();
                        let message = parsed.into_inner();
                        self.session.consume(consumed);
                        return Ok(Some(message));
                    }
                    Err(ParseError::Incomplete) => {}
                    Err(ParseError::Invalid) => {
                        return Err(Error::new(ErrorKind::InvalidData, "invalid message"));
                    }
                }
            }
            match self.session.fill()? {
                0 => {
                    if self.session.buffer().is_empty() {
                        return Ok(None);
                    }
                    return Err(Error::new(
                        ErrorKind::UnexpectedEof,
                        "stream closed mid-message",
                    ));
                }
                _ => continue,
            }
        }
    }

    /// Composes a reply and flushes the session buffer.
    pub fn send(&mut self, tx: &Tx) -> Result<usize> {
        let size = tx.compose(self.session.write_buffer());
        self.session.flush()?;
        Ok(size)
    }
}
