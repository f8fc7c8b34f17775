// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Update: overwrite an existing data item's bytes and optionally move its
//! data time. A new time of zero keeps the existing time.

use super::context::{Guard, Mutation, ScriptAbort, Tx, FIELD_LAST_REMOVED_TIME};
use super::{bytes_arg, str_arg, time_arg, Status};

use protocol_resp::Message;
use silo_store::Store;

pub(crate) fn run(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        let list = bytes_arg(args, 1, "list")?;
        let data_id = bytes_arg(args, 2, "data_id")?;
        let data = bytes_arg(args, 3, "data")?;
        let new_time = time_arg(args, 4, "new_data_time")?;
        let debug_id = str_arg(args, 5, "debug_id").unwrap_or("-");

        let payload = apply(tx, list, data_id, data, new_time)?;
        trace!(
            "update[{}]: {}/{} cleanings={}",
            debug_id,
            tx.keys.collection(),
            String::from_utf8_lossy(list),
            tx.cleanings
        );
        Ok(payload)
    })
}

/// The update body, shared with the upsert dispatcher. The second payload
/// element is zero when the in-script cleaning pass removed the target
/// before it could be written.
pub(crate) fn apply(
    tx: &mut Tx,
    list: &[u8],
    data_id: &[u8],
    data: &[u8],
    new_time: f64,
) -> Result<Vec<Message>, ScriptAbort> {
    let status = tx
        .read_status()?
        .ok_or(ScriptAbort::new(Status::CollectionDeleted, "collection was deleted"))?;

    let data_key = tx.keys.data(list);
    let queue_key = tx.keys.queue();

    if !tx
        .store
        .hexists(&data_key, data_id)
        .map_err(ScriptAbort::internal)?
    {
        return Err(ScriptAbort::new(
            Status::NonExistentDataId,
            "data id does not exist",
        ));
    }

    if !status.older_allowed && new_time != 0.0 && new_time < status.last_removed_time {
        return Err(ScriptAbort::new(
            Status::OlderThanAllowed,
            "data time is older than the last removed time",
        ));
    }

    let guard = Guard { list, data_id };
    tx.clean(guard, false)?;

    // cleaning may have taken the target with it
    if !tx
        .store
        .hexists(&data_key, data_id)
        .map_err(ScriptAbort::internal)?
    {
        return Ok(vec![
            Message::integer(tx.cleanings as i64),
            Message::integer(0),
        ]);
    }

    let old_data = tx
        .store
        .hget(&data_key, data_id)
        .map_err(ScriptAbort::internal)?
        .map(|v| v.to_vec())
        .ok_or_else(|| ScriptAbort::inconsistent("data item vanished mid-script"))?;

    tx.guarded(
        guard,
        Mutation::HSet {
            key: data_key.clone(),
            field: data_id,
            value: data,
        },
    )?;
    tx.undo_hset(data_key.clone(), data_id, old_data);

    if new_time != 0.0 {
        let list_len = tx.store.hlen(&data_key).map_err(ScriptAbort::internal)?;
        if list_len == 1 {
            // sole item: its time lives in the queue score
            let old_score = tx
                .store
                .zscore(&queue_key, list)
                .map_err(ScriptAbort::internal)?
                .ok_or_else(|| ScriptAbort::inconsistent("list missing from queue"))?;
            tx.guarded(
                guard,
                Mutation::ZAdd {
                    key: queue_key.clone(),
                    member: list,
                    score: new_time,
                },
            )?;
            tx.undo_zadd(queue_key.clone(), list, old_score);
        } else {
            let time_key = tx.keys.time(list);
            let old_time = tx
                .store
                .zscore(&time_key, data_id)
                .map_err(ScriptAbort::internal)?
                .ok_or_else(|| ScriptAbort::inconsistent("time index missing"))?;
            tx.guarded(
                guard,
                Mutation::ZAdd {
                    key: time_key.clone(),
                    member: data_id,
                    score: new_time,
                },
            )?;
            tx.undo_zadd(time_key.clone(), data_id, old_time);

            let old_score = tx
                .store
                .zscore(&queue_key, list)
                .map_err(ScriptAbort::internal)?
                .ok_or_else(|| ScriptAbort::inconsistent("list missing from queue"))?;
            let (_, new_min) = tx
                .store
                .zhead(&time_key)
                .map_err(ScriptAbort::internal)?
                .ok_or_else(|| ScriptAbort::inconsistent("time index emptied unexpectedly"))?;
            tx.store
                .zadd(&queue_key, list, new_min)
                .map_err(ScriptAbort::internal)?;
            tx.undo_zadd(queue_key.clone(), list, old_score);
        }

        let last_removed = tx.status_time(FIELD_LAST_REMOVED_TIME)?;
        if new_time < last_removed {
            tx.set_last_removed_time(0.0)?;
        }
    }

    Ok(vec![
        Message::integer(tx.cleanings as i64),
        Message::integer(1),
    ])
}
