// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Insert: admit a new data item into a list, cleaning proactively first and
//! retrying the data write with forced cleaning if the store refuses it.

use super::context::{
    Guard, Mutation, ScriptAbort, Tx, FIELD_ITEMS, FIELD_LAST_REMOVED_TIME, FIELD_LISTS,
};
use super::{bytes_arg, str_arg, time_arg, Status};

use protocol_resp::Message;
use silo_store::Store;

pub(crate) fn run(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        let list = bytes_arg(args, 1, "list")?;
        let data_id = bytes_arg(args, 2, "data_id")?;
        let data = bytes_arg(args, 3, "data")?;
        let data_time = time_arg(args, 4, "data_time")?;
        let debug_id = str_arg(args, 5, "debug_id").unwrap_or("-");

        let payload = apply(tx, list, data_id, data, data_time)?;
        trace!(
            "insert[{}]: {}/{} cleanings={}",
            debug_id,
            tx.keys.collection(),
            String::from_utf8_lossy(list),
            tx.cleanings
        );
        Ok(payload)
    })
}

/// The insert body, shared with the upsert dispatcher.
pub(crate) fn apply(
    tx: &mut Tx,
    list: &[u8],
    data_id: &[u8],
    data: &[u8],
    data_time: f64,
) -> Result<Vec<Message>, ScriptAbort> {
    let status = tx
        .read_status()?
        .ok_or(ScriptAbort::new(Status::CollectionDeleted, "collection was deleted"))?;

    let data_key = tx.keys.data(list);
    let queue_key = tx.keys.queue();

    if tx
        .store
        .hexists(&data_key, data_id)
        .map_err(ScriptAbort::internal)?
    {
        return Err(ScriptAbort::new(Status::DataIdExists, "data id exists"));
    }

    // the watermark alone decides admission: it outlives the queue index,
    // which vanishes whenever the collection empties
    if !status.older_allowed && data_time < status.last_removed_time {
        return Err(ScriptAbort::new(
            Status::OlderThanAllowed,
            "data time is older than the last removed time",
        ));
    }

    let guard = Guard { list, data_id };
    tx.clean(guard, false)?;

    // a single-item list carries its time in the queue; capture it before
    // the second item forces the time index into existence
    let items_before = tx.store.hlen(&data_key).map_err(ScriptAbort::internal)?;
    let existing = if items_before == 1 {
        let mut pairs = tx.store.hgetall(&data_key).map_err(ScriptAbort::internal)?;
        let (existing_id, _) = pairs
            .pop()
            .ok_or_else(|| ScriptAbort::inconsistent("data map emptied unexpectedly"))?;
        let existing_time = tx
            .store
            .zscore(&queue_key, list)
            .map_err(ScriptAbort::internal)?
            .ok_or_else(|| ScriptAbort::inconsistent("list missing from queue"))?;
        Some((existing_id, existing_time))
    } else {
        None
    };

    tx.guarded(
        guard,
        Mutation::HSet {
            key: data_key.clone(),
            field: data_id,
            value: data,
        },
    )?;
    tx.undo_hdel(data_key.clone(), data_id);

    if items_before == 0 {
        // list just came into existence
        tx.status_add(FIELD_LISTS, 1)?;
        tx.undo_status_add(FIELD_LISTS, -1);
        tx.guarded(
            guard,
            Mutation::ZAdd {
                key: queue_key.clone(),
                member: list,
                score: data_time,
            },
        )?;
        tx.undo_zrem(queue_key.clone(), list);
    } else {
        let time_key = tx.keys.time(list);

        // the new item enters the time index first: if a forced cleaning
        // pass lands on this list while the index is half-built, it finds
        // the guard item and stops instead of reading a missing entry
        tx.guarded(
            guard,
            Mutation::ZAdd {
                key: time_key.clone(),
                member: data_id,
                score: data_time,
            },
        )?;
        tx.undo_zrem(time_key.clone(), data_id);

        if let Some((existing_id, existing_time)) = existing {
            // second item: the resident item joins the materialized index
            tx.guarded(
                guard,
                Mutation::ZAdd {
                    key: time_key.clone(),
                    member: &existing_id,
                    score: existing_time,
                },
            )?;
            tx.undo_zrem(time_key.clone(), &existing_id);
        }

        let old_score = tx
            .store
            .zscore(&queue_key, list)
            .map_err(ScriptAbort::internal)?
            .ok_or_else(|| ScriptAbort::inconsistent("list missing from queue"))?;
        match tx.store.zhead(&time_key).map_err(ScriptAbort::internal)? {
            Some((_, new_min)) => {
                tx.store
                    .zadd(&queue_key, list, new_min)
                    .map_err(ScriptAbort::internal)?;
                tx.undo_zadd(queue_key.clone(), list, old_score);
            }
            None => {
                // forced cleaning inside the index write drained the list
                // down to the new item and dropped the index with it; the
                // list now exists only because of this insert
                tx.store
                    .zadd(&queue_key, list, data_time)
                    .map_err(ScriptAbort::internal)?;
                tx.undo_status_add(FIELD_LISTS, -1);
                tx.undo_zrem(queue_key.clone(), list);
            }
        }
    }

    tx.status_add(FIELD_ITEMS, 1)?;
    tx.undo_status_add(FIELD_ITEMS, -1);

    // admitting an item older than everything removed so far reopens the
    // collection to old times
    let last_removed = tx.status_time(FIELD_LAST_REMOVED_TIME)?;
    if data_time < last_removed {
        tx.set_last_removed_time(0.0)?;
    }

    Ok(vec![Message::integer(tx.cleanings as i64)])
}
