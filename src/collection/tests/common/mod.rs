// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Helpers shared by the integration suites: an embedded store with the
//! transaction scripts registered, and collections opened over it.

// not every suite uses every helper
#![allow(dead_code)]

use silo::{Collection, CollectionParams, EmbeddedChannel};
use silo_store::Store;

use std::sync::{Arc, Mutex};

pub fn store_with(maxmemory: u64) -> Arc<Mutex<Store>> {
    let mut store = Store::builder().maxmemory(maxmemory).build();
    silo::register_scripts(&mut store);
    Arc::new(Mutex::new(store))
}

pub fn open(store: &Arc<Mutex<Store>>, name: &str, params: CollectionParams) -> Collection {
    Collection::open(
        Box::new(EmbeddedChannel::new(store.clone())),
        name,
        params,
    )
    .expect("open collection")
}

/// A collection on an unbounded store.
pub fn collection(name: &str) -> (Arc<Mutex<Store>>, Collection) {
    let store = store_with(0);
    let handle = open(&store, name, CollectionParams::default());
    (store, handle)
}
