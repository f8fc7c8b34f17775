// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! `silod`: a TCP server exposing the backing store and the collection
//! transaction scripts. One session thread per connection; every command
//! takes the store lock for its duration, which is what gives scripts their
//! atomicity.

#[macro_use]
extern crate log;

use config::{ServerConfig, SilodConfig, StoreConfig};
use protocol_common::Execute;
use protocol_resp::{Message, MessageParser, Request};
use session::{ServerSession, Session};
use silo_store::Store;

use std::io::Result;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// A running server. Dropping the handle leaves the server running;
/// call [`Silod::shutdown`] to stop it or [`Silod::wait`] to serve
/// until the process exits.
pub struct Silod {
    listener: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    addr: SocketAddr,
    store: Arc<Mutex<Store>>,
}

impl Silod {
    /// Builds the store, registers the collection scripts, binds the
    /// listener, and spawns the accept loop.
    pub fn spawn(config: &SilodConfig) -> Result<Self> {
        let mut store = Store::builder()
            .maxmemory(config.store().maxmemory())
            .maxmemory_policy(config.store().maxmemory_policy())
            .build();
        silo::register_scripts(&mut store);
        let store = Arc::new(Mutex::new(store));

        let listener = TcpListener::bind(config.server().socket_addr()?)?;
        let addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_store = store.clone();
        let accept_shutdown = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("listener".to_string())
            .spawn(move || accept_loop(listener, accept_store, accept_shutdown))?;

        info!("silod listening on {}", addr);

        Ok(Self {
            listener: handle,
            shutdown,
            addr,
            store,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Direct access to the store, for embedded use and tests.
    pub fn store(&self) -> Arc<Mutex<Store>> {
        self.store.clone()
    }

    /// Serves until the listener thread exits.
    pub fn wait(self) {
        let _ = self.listener.join();
    }

    /// Stops accepting connections and joins the listener thread. Sessions
    /// already running finish their current request and close on their own.
    pub fn shutdown(self) {
        info!("shutdown...");
        self.shutdown.store(true, Ordering::SeqCst);
        // wake the accept loop
        let _ = TcpStream::connect(self.addr);
        let _ = self.listener.join();
    }
}

fn accept_loop(listener: TcpListener, store: Arc<Mutex<Store>>, shutdown: Arc<AtomicBool>) {
    for stream in listener.incoming() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => {
                let store = store.clone();
                let result = std::thread::Builder::new()
                    .name("session".to_string())
                    .spawn(move || serve_session(stream, store));
                if let Err(e) = result {
                    warn!("failed to spawn session thread: {}", e);
                }
            }
            Err(e) => {
                warn!("accept failed: {}", e);
            }
        }
    }
}

fn serve_session(stream: TcpStream, store: Arc<Mutex<Store>>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "-".to_string());
    debug!("session open: {}", peer);

    let _ = stream.set_nodelay(true);
    let mut session: ServerSession<MessageParser, Message, Message> =
        ServerSession::new(Session::new(stream), MessageParser::default());

    loop {
        match session.receive() {
            Ok(Some(message)) => {
                let reply = match Request::try_from(&message) {
                    Ok(request) => {
                        let mut store = store.lock().unwrap_or_else(|e| e.into_inner());
                        store.execute(&request)
                    }
                    Err(e) => Message::error(e.message()),
                };
                if session.send(&reply).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("session error: {}", e);
                let _ = session.send(&Message::error("ERR protocol error"));
                break;
            }
        }
    }

    debug!("session closed: {}", peer);
}
