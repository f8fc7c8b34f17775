// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Behavior under memory pressure: proactive cleaning, forced cleaning on
//! refused writes, advance-cleanup widening, and the rollback path when a
//! mutation cannot make room for itself.

mod common;

use common::*;

use silo::{CollectionParams, ErrorKind, KeySpace};

const KIB: usize = 1024;

fn payload(len: usize) -> Vec<u8> {
    vec![b'x'; len]
}

#[test]
fn eviction_across_lists_under_pressure() {
    let store = store_with(20_000);
    let mut c = open(&store, "c", CollectionParams::default());

    // far more data than the ceiling admits; times strictly increase
    for i in 0..30u32 {
        let list = if i % 2 == 0 { "L1" } else { "L2" };
        c.insert(list, &format!("d{}", i), &payload(KIB), Some(1.0 + i as f64))
            .expect("insert under pressure");
    }

    let info = c.collection_info().expect("info");
    assert!(info.items < 30, "eviction must have removed items");
    assert!(info.items > 0);
    assert!(info.last_removed_time > 0.0);

    // counts stay consistent across both lists
    let l1 = c.list_info("L1").expect("l1").items;
    let l2 = c.list_info("L2").expect("l2").items;
    assert_eq!(info.items, l1 + l2);

    // the survivors are the newest items; they drain in time order
    let mut last = 0.0;
    let mut drained = 0;
    while let Some((_, _data)) = c.pop_oldest().expect("pop") {
        let removed = c.collection_info().expect("info").last_removed_time;
        assert!(removed >= last, "pop times must not decrease");
        last = removed;
        drained += 1;
    }
    assert_eq!(drained, info.items);
}

#[test]
fn eviction_empties_and_unqueues_lists() {
    let store = store_with(6_000);
    let keys = KeySpace::new("c");
    let mut c = open(&store, "c", CollectionParams::default());

    // L1 gets one old item, then enough pressure arrives on L2 to force
    // L1's eviction entirely
    c.insert("L1", "old", &payload(KIB), Some(1.0)).expect("insert");
    for i in 0..10u32 {
        c.insert("L2", &format!("d{}", i), &payload(KIB), Some(10.0 + i as f64))
            .expect("insert");
    }

    assert_eq!(c.list_info("L1").expect("l1").items, 0);
    assert!(!c.list_exists("L1").expect("exists"));
    assert!(!store.lock().unwrap().exists(&keys.data(b"L1")));

    let info = c.collection_info().expect("info");
    assert_eq!(info.lists, 1);
}

#[test]
fn forced_cleaning_after_refused_write() {
    // reserve of 0.05 keeps the proactive pass quiet until the store is
    // nearly full, so the data write itself gets refused and retried
    let store = store_with(2_750);
    let params = CollectionParams {
        memory_reserve: 0.05,
        ..CollectionParams::default()
    };
    let mut c = open(&store, "c", params);

    c.insert("L1", "a", &payload(KIB), Some(1.0)).expect("first insert");
    c.insert("L2", "b", &payload(KIB), Some(2.0))
        .expect("second insert evicts the first");

    assert_eq!(c.receive_one("L1", "a").expect("receive"), None);
    assert_eq!(c.receive_one("L2", "b").expect("receive"), Some(payload(KIB)));

    let info = c.collection_info().expect("info");
    assert_eq!(info.items, 1);
    assert_eq!(info.lists, 1);
    assert_eq!(info.last_removed_time, 1.0);
}

#[test]
fn rollback_when_mutation_cannot_make_room() {
    // sized so the data write of a second item into the same list fits,
    // but the time index materialization pushes past the ceiling: the only
    // evictable item is the mutation's own target list head, the guard
    // aborts the cleaning pass, and the rollback log undoes the write.
    //
    // after the first insert the store holds the status record, the queue,
    // and one 1 KiB item; the second data write adds 32 + 1 + 1024 bytes,
    // and a 50 byte slack on top of that refuses the index write that
    // follows.
    let store = store_with(0);
    let params = CollectionParams {
        memory_reserve: 0.05,
        ..CollectionParams::default()
    };
    let mut c = open(&store, "c", params);
    c.insert("L1", "a", &payload(KIB), Some(5.0)).expect("first insert");

    let used = store.lock().unwrap().used_memory();
    store.lock().unwrap().set_maxmemory(used + (32 + 1 + KIB as u64) + 50);

    let err = c.insert("L1", "b", &payload(KIB), Some(1.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MaxMemoryLimit);

    // the failed insert left no trace
    assert_eq!(c.receive_one("L1", "b").expect("receive"), None);
    assert_eq!(c.receive_one("L1", "a").expect("receive"), Some(payload(KIB)));
    let info = c.collection_info().expect("info");
    assert_eq!(info.items, 1);
    assert_eq!(info.lists, 1);

    let keys = KeySpace::new("c");
    assert!(!store.lock().unwrap().exists(&keys.time(b"L1")));

    // the handle remembers the classification
    assert_eq!(c.last_error(), Some(ErrorKind::MaxMemoryLimit));
}

#[test]
fn advance_cleanup_num_widens_the_pass() {
    let store = store_with(0);
    let params = CollectionParams {
        advance_cleanup_num: 3,
        ..CollectionParams::default()
    };
    let mut c = open(&store, "c", params);

    // no pressure yet: the advance quota alone must not evict anything
    for i in 0..8u32 {
        c.insert("L1", &format!("d{}", i), &payload(KIB), Some(1.0 + i as f64))
            .expect("insert");
    }
    assert_eq!(c.collection_info().expect("info").items, 8);

    // now a ceiling makes the next insert clean; the quota widens the pass
    let used = store.lock().unwrap().used_memory();
    store.lock().unwrap().set_maxmemory(used);

    c.insert("L1", "d8", &payload(KIB), Some(9.0)).expect("insert");
    let info = c.collection_info().expect("info");
    assert!(
        info.items <= 6,
        "advance quota should have widened the pass, items={}",
        info.items
    );
}

#[test]
fn advance_cleanup_bytes_widens_the_pass() {
    let store = store_with(0);
    let params = CollectionParams {
        advance_cleanup_bytes: 3 * KIB as u64,
        ..CollectionParams::default()
    };
    let mut c = open(&store, "c", params);

    for i in 0..8u32 {
        c.insert("L1", &format!("d{}", i), &payload(KIB), Some(1.0 + i as f64))
            .expect("insert");
    }
    assert_eq!(c.collection_info().expect("info").items, 8);

    let used = store.lock().unwrap().used_memory();
    store.lock().unwrap().set_maxmemory(used);

    c.insert("L1", "d8", &payload(KIB), Some(9.0)).expect("insert");
    let info = c.collection_info().expect("info");
    assert!(
        info.items <= 6,
        "at least three KiB of old items should be gone, items={}",
        info.items
    );
}

#[test]
fn pop_on_empty_collection() {
    let (_store, mut c) = collection("c");
    assert_eq!(c.pop_oldest().expect("pop"), None);

    c.insert("L1", "d1", b"x", Some(1.0)).expect("insert");
    c.pop_oldest().expect("pop");
    assert_eq!(c.pop_oldest().expect("pop"), None);
}

#[test]
fn update_of_oldest_item_under_pressure_is_refused() {
    // the cleaning pass an update triggers must not delete its own target;
    // when the target is the globally oldest item the pass cannot free
    // anything and the update is refused
    let store = store_with(0);
    let mut c = open(&store, "c", CollectionParams::default());

    c.insert("L1", "a", &payload(KIB), Some(1.0)).expect("insert");
    c.insert("L1", "b", &payload(KIB), Some(2.0)).expect("insert");
    c.insert("L2", "c", &payload(KIB), Some(3.0)).expect("insert");

    let used = store.lock().unwrap().used_memory();
    store.lock().unwrap().set_maxmemory(used);

    let err = c.update("L1", "a", &payload(KIB), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MaxMemoryLimit);

    // nothing was changed or evicted
    assert_eq!(c.receive_one("L1", "a").expect("receive"), Some(payload(KIB)));
    assert_eq!(c.collection_info().expect("info").items, 3);
}

#[test]
fn update_under_pressure_cleans_older_items() {
    let store = store_with(0);
    let mut c = open(&store, "c", CollectionParams::default());

    c.insert("L1", "a", &payload(KIB), Some(1.0)).expect("insert");
    c.insert("L1", "b", &payload(KIB), Some(2.0)).expect("insert");
    c.insert("L2", "c", &payload(KIB), Some(3.0)).expect("insert");

    let used = store.lock().unwrap().used_memory();
    store.lock().unwrap().set_maxmemory(used);

    // updating "b" lets the pass evict "a" (older) and then stop at the
    // guard; the update itself goes through
    let updated = c.update("L1", "b", &payload(KIB), None).expect("update");
    assert!(updated);
    assert_eq!(c.receive_one("L1", "a").expect("receive"), None);
    assert_eq!(c.receive_one("L1", "b").expect("receive"), Some(payload(KIB)));
}

#[test]
fn strict_mode_watermark_rises_with_eviction() {
    let store = store_with(8_000);
    let params = CollectionParams {
        older_allowed: false,
        ..CollectionParams::default()
    };
    let mut c = open(&store, "strict", params);

    for i in 0..20u32 {
        c.insert("L1", &format!("d{}", i), &payload(KIB), Some(1.0 + i as f64))
            .expect("insert");
    }

    let info = c.collection_info().expect("info");
    assert!(info.last_removed_time > 0.0);

    // anything at or below the watermark is now refused
    let err = c
        .insert("L1", "late", &payload(16), Some(info.last_removed_time - 0.5))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OlderThanAllowed);
}
