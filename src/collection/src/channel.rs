// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Transport between the driver and the backing store: a TCP channel
//! speaking the wire protocol, and an embedded channel bound directly to an
//! in-process store.

use protocol_common::Execute;
use protocol_resp::{Message, MessageParser, Request};
use session::{ClientSession, Session};
use silo_store::Store;

use std::io::{Error, ErrorKind, Result};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};

/// One request/reply exchange with the backing store.
pub trait Channel: Send {
    fn exchange(&mut self, request: &Request) -> Result<Message>;

    /// Re-establishes the underlying connection, where that makes sense.
    fn reconnect(&mut self) -> Result<()> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "channel cannot reconnect",
        ))
    }

    fn can_reconnect(&self) -> bool {
        false
    }
}

/// A blocking TCP connection to a backing store server.
pub struct TcpChannel {
    addr: SocketAddr,
    session: ClientSession<MessageParser, Request, Message>,
}

impl TcpChannel {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::new(ErrorKind::AddrNotAvailable, "could not resolve addr"))?;
        Ok(Self {
            addr,
            session: Self::open_session(addr)?,
        })
    }

    fn open_session(addr: SocketAddr) -> Result<ClientSession<MessageParser, Request, Message>> {
        let stream = TcpStream::connect(addr)?;
        let _ = stream.set_nodelay(true);
        Ok(ClientSession::new(
            Session::new(stream),
            MessageParser::default(),
        ))
    }
}

impl Channel for TcpChannel {
    fn exchange(&mut self, request: &Request) -> Result<Message> {
        self.session.send(request)?;
        self.session.receive()
    }

    fn reconnect(&mut self) -> Result<()> {
        self.session = Self::open_session(self.addr)?;
        Ok(())
    }

    fn can_reconnect(&self) -> bool {
        true
    }
}

/// A channel bound directly to an in-process store. Commands take the
/// store's lock for their duration, which gives scripts the same exclusive
/// execution a server provides.
#[derive(Clone)]
pub struct EmbeddedChannel {
    store: Arc<Mutex<Store>>,
}

impl EmbeddedChannel {
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self { store }
    }
}

impl Channel for EmbeddedChannel {
    fn exchange(&mut self, request: &Request) -> Result<Message> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "store lock poisoned"))?;
        Ok(store.execute(request))
    }
}
