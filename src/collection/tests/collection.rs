// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Behavior of the public operations on an embedded store: insertion,
//! retrieval, ordering, bookkeeping, and the maintenance commands.

mod common;

use common::*;

use silo::{
    CollectionParams, EmbeddedChannel, ErrorKind, KeySpace, OpenOptions, ResizeSpec, SiloError,
};
use silo::Collection;

#[test]
fn basic_insert_receive() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"hello", Some(1.0)).expect("insert");
    assert_eq!(c.receive_one("L1", "d1").expect("receive"), Some(b"hello".to_vec()));

    let info = c.collection_info().expect("info");
    assert_eq!(info.lists, 1);
    assert_eq!(info.items, 1);
    assert_eq!(info.oldest_time, Some(1.0));
    assert_eq!(info.last_removed_time, 0.0);
}

#[test]
fn multi_item_list_pops_by_time() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"a", Some(1.0)).expect("insert");
    c.insert("L1", "d2", b"b", Some(3.0)).expect("insert");
    c.insert("L1", "d3", b"c", Some(2.0)).expect("insert");

    let mut values = c.receive_values("L1").expect("values");
    values.sort();
    assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    assert_eq!(c.list_info("L1").expect("list info").oldest_time, Some(1.0));

    assert_eq!(c.pop_oldest().expect("pop"), Some(("L1".to_string(), b"a".to_vec())));
    assert_eq!(c.pop_oldest().expect("pop"), Some(("L1".to_string(), b"c".to_vec())));
    assert_eq!(c.pop_oldest().expect("pop"), Some(("L1".to_string(), b"b".to_vec())));
    assert_eq!(c.pop_oldest().expect("pop"), None);
}

#[test]
fn duplicate_data_id_is_refused() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"x", Some(1.0)).expect("insert");
    let err = c.insert("L1", "d1", b"y", Some(2.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataIdExists);
    assert_eq!(c.last_error(), Some(ErrorKind::DataIdExists));

    // the stored value is untouched
    assert_eq!(c.receive_one("L1", "d1").expect("receive"), Some(b"x".to_vec()));
}

#[test]
fn older_than_allowed_in_strict_mode() {
    let store = store_with(0);
    let params = CollectionParams {
        older_allowed: false,
        ..CollectionParams::default()
    };
    let mut c = open(&store, "strict", params);

    c.insert("L1", "d1", b"x", Some(5.0)).expect("insert");
    assert_eq!(c.pop_oldest().expect("pop"), Some(("L1".to_string(), b"x".to_vec())));
    assert_eq!(c.collection_info().expect("info").last_removed_time, 5.0);

    let err = c.insert("L1", "d2", b"y", Some(4.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OlderThanAllowed);

    // at or above the watermark is admitted
    c.insert("L1", "d2", b"y", Some(5.0)).expect("insert at watermark");
}

#[test]
fn older_insert_resets_watermark_when_allowed() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"x", Some(5.0)).expect("insert");
    c.pop_oldest().expect("pop");
    assert_eq!(c.collection_info().expect("info").last_removed_time, 5.0);

    // older data is admitted and resets the watermark
    c.insert("L1", "d2", b"y", Some(3.0)).expect("insert older");
    assert_eq!(c.collection_info().expect("info").last_removed_time, 0.0);
}

#[test]
fn update_preserves_time_without_one() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"a", Some(1.0)).expect("insert");
    assert!(c.update("L1", "d1", b"A", None).expect("update"));

    assert_eq!(c.list_info("L1").expect("list info").oldest_time, Some(1.0));
    assert_eq!(c.receive_one("L1", "d1").expect("receive"), Some(b"A".to_vec()));

    // updates are idempotent
    assert!(c.update("L1", "d1", b"A", None).expect("update again"));
    assert_eq!(c.receive_one("L1", "d1").expect("receive"), Some(b"A".to_vec()));
}

#[test]
fn update_moves_time() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"a", Some(1.0)).expect("insert");
    c.insert("L1", "d2", b"b", Some(2.0)).expect("insert");

    // move d1 behind d2
    assert!(c.update("L1", "d1", b"a2", Some(3.0)).expect("update"));
    assert_eq!(c.list_info("L1").expect("list info").oldest_time, Some(2.0));
    assert_eq!(c.pop_oldest().expect("pop"), Some(("L1".to_string(), b"b".to_vec())));
    assert_eq!(c.pop_oldest().expect("pop"), Some(("L1".to_string(), b"a2".to_vec())));
}

#[test]
fn update_of_missing_id_fails() {
    let (_store, mut c) = collection("c");
    let err = c.update("L1", "nope", b"x", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NonExistentDataId);
}

#[test]
fn upsert_dispatches_on_existence() {
    let (_store, mut c) = collection("c");

    c.upsert("L1", "d1", b"first", Some(1.0)).expect("upsert inserts");
    assert_eq!(c.list_len("L1").expect("len"), 1);

    c.upsert("L1", "d1", b"second", None).expect("upsert updates");
    assert_eq!(c.list_len("L1").expect("len"), 1);
    assert_eq!(c.receive_one("L1", "d1").expect("receive"), Some(b"second".to_vec()));
    // a timeless upsert-update keeps the existing time
    assert_eq!(c.list_info("L1").expect("list info").oldest_time, Some(1.0));

    // a timeless upsert-insert stamps the current time
    c.upsert("L1", "d2", b"now", None).expect("upsert now");
    let time = c.list_info("L1").expect("list info").oldest_time.expect("oldest");
    assert_eq!(time, 1.0);
    assert_eq!(c.list_len("L1").expect("len"), 2);
}

#[test]
fn receive_modes() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"a", Some(1.0)).expect("insert");
    c.insert("L1", "d2", b"b", Some(2.0)).expect("insert");

    assert_eq!(c.list_len("L1").expect("len"), 2);
    assert_eq!(c.receive_one("L1", "d2").expect("one"), Some(b"b".to_vec()));
    assert_eq!(c.receive_one("L1", "d9").expect("one"), None);

    let mut all = c.receive_all("L1").expect("all");
    all.sort();
    assert_eq!(
        all,
        vec![
            ("d1".to_string(), b"a".to_vec()),
            ("d2".to_string(), b"b".to_vec())
        ]
    );

    // absent lists read as empty
    assert_eq!(c.list_len("L9").expect("len"), 0);
    assert_eq!(c.receive_values("L9").expect("values"), Vec::<Vec<u8>>::new());
    assert_eq!(c.receive_one("L9", "d1").expect("one"), None);
}

#[test]
fn single_item_list_has_no_time_index() {
    let (store, mut c) = collection("c");
    let keys = KeySpace::new("c");

    c.insert("L1", "d1", b"a", Some(1.0)).expect("insert");
    assert!(!store.lock().unwrap().exists(&keys.time(b"L1")));

    c.insert("L1", "d2", b"b", Some(2.0)).expect("insert");
    assert!(store.lock().unwrap().exists(&keys.time(b"L1")));

    // back down to one item: the index vanishes again
    c.pop_oldest().expect("pop");
    assert!(!store.lock().unwrap().exists(&keys.time(b"L1")));

    // and so does everything else with the last item
    c.pop_oldest().expect("pop");
    assert!(!store.lock().unwrap().exists(&keys.data(b"L1")));
    assert!(!store.lock().unwrap().exists(&keys.queue()));
}

#[test]
fn oldest_time_and_list_exists() {
    let (_store, mut c) = collection("c");

    assert_eq!(c.oldest_time().expect("oldest"), None);
    assert!(!c.list_exists("L1").expect("exists"));

    c.insert("L1", "d1", b"a", Some(4.5)).expect("insert");
    assert_eq!(c.oldest_time().expect("oldest"), Some(4.5));
    assert!(c.list_exists("L1").expect("exists"));
}

#[test]
fn counts_match_across_lists() {
    let (_store, mut c) = collection("c");

    for i in 0..4u32 {
        c.insert("L1", &format!("a{}", i), b"x", Some(1.0 + i as f64))
            .expect("insert");
    }
    for i in 0..3u32 {
        c.insert("L2", &format!("b{}", i), b"y", Some(10.0 + i as f64))
            .expect("insert");
    }

    let info = c.collection_info().expect("info");
    assert_eq!(info.lists, 2);
    assert_eq!(info.items, 7);
    assert_eq!(
        info.items,
        c.list_info("L1").expect("l1").items + c.list_info("L2").expect("l2").items
    );
}

#[test]
fn drop_list_removes_one_list() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"a", Some(1.0)).expect("insert");
    c.insert("L1", "d2", b"b", Some(2.0)).expect("insert");
    c.insert("L2", "d1", b"c", Some(3.0)).expect("insert");

    assert!(c.drop_list("L1").expect("drop"));
    assert!(!c.drop_list("L1").expect("drop again"));

    let info = c.collection_info().expect("info");
    assert_eq!(info.lists, 1);
    assert_eq!(info.items, 1);
    assert_eq!(c.pop_oldest().expect("pop"), Some(("L2".to_string(), b"c".to_vec())));
}

#[test]
fn clear_keeps_configuration() {
    let store = store_with(0);
    let params = CollectionParams {
        older_allowed: false,
        advance_cleanup_num: 7,
        ..CollectionParams::default()
    };
    let mut c = open(&store, "c", params.clone());

    c.insert("L1", "d1", b"a", Some(5.0)).expect("insert");
    c.pop_oldest().expect("pop");
    c.insert("L1", "d2", b"b", Some(6.0)).expect("insert");

    let deleted = c.clear_collection().expect("clear");
    assert!(deleted >= 1);

    let info = c.collection_info().expect("info");
    assert_eq!(info.lists, 0);
    assert_eq!(info.items, 0);
    assert_eq!(info.last_removed_time, 0.0);
    // policy fields survive
    assert!(!info.older_allowed);
    assert_eq!(info.advance_cleanup_num, 7);

    // and the collection is usable again, strict mode intact
    c.insert("L1", "d3", b"c", Some(1.0)).expect("insert after clear");
}

#[test]
fn drop_collection_deletes_everything() {
    let (_store, mut c) = collection("c");

    c.insert("L1", "d1", b"a", Some(1.0)).expect("insert");
    c.insert("L2", "d1", b"b", Some(2.0)).expect("insert");
    c.insert("L2", "d2", b"c", Some(3.0)).expect("insert");

    // status, queue, two data maps, one time index
    assert_eq!(c.drop_collection().expect("drop"), 5);

    let err = c.collection_info().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollectionDeleted);
    let err = c.insert("L1", "d9", b"x", Some(9.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollectionDeleted);
}

#[test]
fn resize_changes_status_fields() {
    let (store, mut c) = collection("c");

    let changed = c
        .resize(ResizeSpec {
            advance_cleanup_num: Some(5),
            older_allowed: Some(false),
            ..ResizeSpec::default()
        })
        .expect("resize");
    assert_eq!(changed, 2);

    // unchanged values do not count
    let changed = c
        .resize(ResizeSpec {
            advance_cleanup_num: Some(5),
            ..ResizeSpec::default()
        })
        .expect("resize same");
    assert_eq!(changed, 0);

    let info = c.collection_info().expect("info");
    assert!(!info.older_allowed);
    assert_eq!(info.advance_cleanup_num, 5);

    // an empty resize is an argument error
    let err = c.resize(ResizeSpec::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);

    // a fresh handle must open with the resized parameters
    let reopened = Collection::open(
        Box::new(EmbeddedChannel::new(store.clone())),
        "c",
        CollectionParams {
            older_allowed: false,
            advance_cleanup_num: 5,
            ..CollectionParams::default()
        },
    );
    assert!(reopened.is_ok());
}

#[test]
fn open_validates_against_stored_parameters() {
    let store = store_with(0);
    let _c = open(&store, "c", CollectionParams::default());

    let mismatched = Collection::open(
        Box::new(EmbeddedChannel::new(store.clone())),
        "c",
        CollectionParams {
            older_allowed: false,
            ..CollectionParams::default()
        },
    );
    assert_eq!(mismatched.unwrap_err().kind(), ErrorKind::Argument);

    let matched = Collection::open(
        Box::new(EmbeddedChannel::new(store.clone())),
        "c",
        CollectionParams::default(),
    );
    assert!(matched.is_ok());
}

#[test]
fn argument_validation() {
    let store = store_with(0);

    let err = Collection::open(
        Box::new(EmbeddedChannel::new(store.clone())),
        "a:b",
        CollectionParams::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);

    let err = Collection::open(
        Box::new(EmbeddedChannel::new(store.clone())),
        "c",
        CollectionParams {
            memory_reserve: 0.9,
            ..CollectionParams::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);

    let mut c = open(&store, "c", CollectionParams::default());
    assert_eq!(
        c.insert("bad:list", "d", b"x", Some(1.0)).unwrap_err().kind(),
        ErrorKind::Argument
    );
    assert_eq!(
        c.insert("L1", "d", b"x", Some(-1.0)).unwrap_err().kind(),
        ErrorKind::Argument
    );
    // an empty data id is legal
    c.insert("L1", "", b"x", Some(1.0)).expect("empty id");
    assert_eq!(c.receive_one("L1", "").expect("receive"), Some(b"x".to_vec()));
}

#[test]
fn data_too_large_is_refused() {
    let store = store_with(0);
    let mut c = Collection::open_with(
        Box::new(EmbeddedChannel::new(store.clone())),
        "c",
        CollectionParams::default(),
        OpenOptions {
            max_datasize: Some(8),
            ..OpenOptions::default()
        },
    )
    .expect("open");

    match c.insert("L1", "d1", b"123456789", Some(1.0)).unwrap_err() {
        SiloError::DataTooLarge { size, limit } => {
            assert_eq!(size, 9);
            assert_eq!(limit, 8);
        }
        other => panic!("unexpected error: {}", other),
    }
    c.insert("L1", "d1", b"12345678", Some(1.0)).expect("at the limit");
}

#[test]
fn ping_and_config_checks() {
    let (_store, mut c) = collection("c");
    assert!(c.ping().expect("ping"));
    assert!(c.store_config_ok().expect("config"));
    assert!(c.used_memory().expect("used") > 0);
}
