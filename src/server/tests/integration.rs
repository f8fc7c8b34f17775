// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! End-to-end tests over TCP: a silod instance on an ephemeral port, driven
//! through the collection client.

use config::SilodConfig;
use protocol_resp::{Message, Request};
use silo::{Channel, Collection, CollectionParams, ErrorKind, TcpChannel};
use silo_server::Silod;

fn ephemeral_config(extra: &str) -> SilodConfig {
    let toml = format!("[server]\nport = \"0\"\n{}", extra);
    toml::from_str(&toml).expect("test config parses")
}

fn open(server: &Silod, name: &str, params: CollectionParams) -> Collection {
    let channel = TcpChannel::connect(server.local_addr()).expect("connect");
    Collection::open(Box::new(channel), name, params).expect("open collection")
}

#[test]
fn end_to_end_over_tcp() {
    let server = Silod::spawn(&ephemeral_config("")).expect("spawn");
    let mut c = open(&server, "c", CollectionParams::default());

    assert!(c.ping().expect("ping"));
    assert!(c.store_config_ok().expect("config"));

    c.insert("L1", "d1", b"hello", Some(1.0)).expect("insert");
    c.insert("L1", "d2", b"world", Some(2.0)).expect("insert");
    assert_eq!(
        c.receive_one("L1", "d1").expect("receive"),
        Some(b"hello".to_vec())
    );

    // a second connection observes the same collection
    let mut other = open(&server, "c", CollectionParams::default());
    assert_eq!(other.list_len("L1").expect("len"), 2);
    assert_eq!(
        other.pop_oldest().expect("pop"),
        Some(("L1".to_string(), b"hello".to_vec()))
    );

    // and the first sees the pop
    let info = c.collection_info().expect("info");
    assert_eq!(info.items, 1);
    assert_eq!(info.last_removed_time, 1.0);

    server.shutdown();
}

#[test]
fn script_flush_reload_is_transparent() {
    let server = Silod::spawn(&ephemeral_config("")).expect("spawn");
    let mut c = open(&server, "c", CollectionParams::default());

    c.insert("L1", "d1", b"a", Some(1.0)).expect("insert");

    // flush the script cache out from under the driver
    let mut raw = TcpChannel::connect(server.local_addr()).expect("connect");
    let reply = raw.exchange(&Request::ScriptFlush).expect("flush");
    assert_eq!(reply, Message::simple_string("OK"));

    // the next dispatch reloads by source and succeeds
    c.insert("L1", "d2", b"b", Some(2.0)).expect("insert after flush");
    assert_eq!(c.list_len("L1").expect("len"), 2);

    server.shutdown();
}

#[test]
fn eviction_over_tcp() {
    let server = Silod::spawn(&ephemeral_config("[store]\nmaxmemory = 20000\n")).expect("spawn");
    let mut c = open(&server, "c", CollectionParams::default());

    for i in 0..30u32 {
        let list = if i % 2 == 0 { "L1" } else { "L2" };
        c.insert(list, &format!("d{}", i), &[b'x'; 1024], Some(1.0 + i as f64))
            .expect("insert under pressure");
    }

    let info = c.collection_info().expect("info");
    assert!(info.items < 30);
    assert!(info.last_removed_time > 0.0);

    server.shutdown();
}

#[test]
fn incompatible_memory_policy_is_refused() {
    let server = Silod::spawn(&ephemeral_config(
        "[store]\nmaxmemory = 1000000\nmaxmemory_policy = \"allkeys-lru\"\n",
    ))
    .expect("spawn");

    let channel = TcpChannel::connect(server.local_addr()).expect("connect");
    let err = Collection::open(Box::new(channel), "c", CollectionParams::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MaxMemoryPolicy);

    server.shutdown();
}

#[test]
fn connecting_to_a_downed_server_fails() {
    let server = Silod::spawn(&ephemeral_config("")).expect("spawn");
    let addr = server.local_addr();
    server.shutdown();

    assert!(TcpChannel::connect(addr).is_err());
}
