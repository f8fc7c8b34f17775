// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Model-based checks: random operation sequences against an in-memory
//! model, verifying the counter invariants, the single-item index rule,
//! and that pop-oldest always yields a globally minimal data time.

mod common;

use common::*;

use proptest::prelude::*;
use silo::{ErrorKind, KeySpace};

use std::collections::HashMap;

const LISTS: [&str; 3] = ["LA", "LB", "LC"];

#[derive(Debug, Clone)]
enum Op {
    Insert { list: usize, id: u8, time: u16 },
    Update { list: usize, id: u8 },
    Pop,
    DropList { list: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (0..LISTS.len(), 0u8..8, 1u16..50).prop_map(|(list, id, time)| {
            Op::Insert { list, id, time }
        }),
        2 => (0..LISTS.len(), 0u8..8).prop_map(|(list, id)| Op::Update { list, id }),
        2 => Just(Op::Pop),
        1 => (0..LISTS.len()).prop_map(|list| Op::DropList { list }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_across_random_operations(
        ops in proptest::collection::vec(op_strategy(), 1..40)
    ) {
        let (store, mut c) = collection("c");
        let keys = KeySpace::new("c");

        // model: (list index, id) -> (time, unique payload)
        let mut model: HashMap<(usize, u8), (f64, Vec<u8>)> = HashMap::new();
        let mut serial = 0u64;

        for op in ops {
            match op {
                Op::Insert { list, id, time } => {
                    serial += 1;
                    let payload = format!("payload-{}", serial).into_bytes();
                    let result = c.insert(
                        LISTS[list],
                        &id.to_string(),
                        &payload,
                        Some(time as f64),
                    );
                    if model.contains_key(&(list, id)) {
                        prop_assert_eq!(
                            result.unwrap_err().kind(),
                            ErrorKind::DataIdExists
                        );
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert((list, id), (time as f64, payload));
                    }
                }
                Op::Update { list, id } => {
                    serial += 1;
                    let payload = format!("payload-{}", serial).into_bytes();
                    let result = c.update(LISTS[list], &id.to_string(), &payload, None);
                    match model.get_mut(&(list, id)) {
                        Some(entry) => {
                            prop_assert!(result.expect("update succeeds"));
                            entry.1 = payload;
                        }
                        None => {
                            prop_assert_eq!(
                                result.unwrap_err().kind(),
                                ErrorKind::NonExistentDataId
                            );
                        }
                    }
                }
                Op::Pop => {
                    let popped = c.pop_oldest().expect("pop");
                    if model.is_empty() {
                        prop_assert_eq!(popped, None);
                    } else {
                        let (list, data) = popped.expect("pop yields an item");
                        // the payload identifies the popped entry uniquely
                        let key = *model
                            .iter()
                            .find(|(_, (_, payload))| *payload == data)
                            .expect("popped item is in the model")
                            .0;
                        let min_time = model
                            .values()
                            .map(|(time, _)| *time)
                            .fold(f64::INFINITY, f64::min);
                        let (time, _) = model.remove(&key).expect("entry");
                        prop_assert_eq!(time, min_time);
                        prop_assert_eq!(LISTS[key.0], list.as_str());
                    }
                }
                Op::DropList { list } => {
                    let existed = c.drop_list(LISTS[list]).expect("drop list");
                    let had_items = model.keys().any(|(l, _)| *l == list);
                    prop_assert_eq!(existed, had_items);
                    model.retain(|(l, _), _| *l != list);
                }
            }

            // counter invariants after every operation
            let info = c.collection_info().expect("info");
            prop_assert_eq!(info.items, model.len() as u64);
            let nonempty = (0..LISTS.len())
                .filter(|l| model.keys().any(|(ml, _)| ml == l))
                .count();
            prop_assert_eq!(info.lists, nonempty as u64);

            for (index, list) in LISTS.iter().enumerate() {
                let in_model = model.iter().filter(|((l, _), _)| *l == index).count();
                prop_assert_eq!(
                    c.list_info(list).expect("list info").items,
                    in_model as u64
                );

                // single-item lists carry no time index
                let has_index = store.lock().unwrap().exists(&keys.time(list.as_bytes()));
                prop_assert_eq!(has_index, in_model >= 2);
            }
        }

        // drain: pop times never decrease
        let mut last = 0.0;
        while let Some((_, data)) = c.pop_oldest().expect("pop") {
            let key = *model
                .iter()
                .find(|(_, (_, payload))| *payload == data)
                .expect("drained item is in the model")
                .0;
            let (time, _) = model.remove(&key).expect("entry");
            prop_assert!(time >= last);
            last = time;
        }
        prop_assert!(model.is_empty());
    }
}
