// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Collection and list introspection, and the idempotent create-or-validate
//! entry point every open goes through.

use super::context::{
    ScriptAbort, FIELD_ADVANCE_CLEANUP_BYTES, FIELD_ADVANCE_CLEANUP_NUM, FIELD_DATA_VERSION,
    FIELD_ITEMS, FIELD_LAST_REMOVED_TIME, FIELD_LISTS, FIELD_MEMORY_RESERVE, FIELD_OLDER_ALLOWED,
};
use super::{bytes_arg, time_arg, u64_arg, Status};
use crate::time::fmt_time;

use protocol_resp::Message;
use silo_store::Store;

pub(crate) fn run_collection_info(
    store: &mut Store,
    _keys: &[Vec<u8>],
    args: &[Vec<u8>],
) -> Message {
    super::run_with_tx(store, args, |tx| {
        let status = tx.read_status()?.ok_or(ScriptAbort::new(
            Status::CollectionDeleted,
            "collection was deleted",
        ))?;

        let queue_key = tx.keys.queue();
        let oldest = tx.store.zhead(&queue_key).map_err(ScriptAbort::internal)?;

        Ok(vec![
            Message::integer(status.lists as i64),
            Message::integer(status.items as i64),
            match oldest {
                Some((_, time)) => Message::bulk_string(fmt_time(time).as_bytes()),
                None => Message::null(),
            },
            Message::bulk_string(fmt_time(status.last_removed_time).as_bytes()),
            Message::integer(status.older_allowed as i64),
            Message::integer(status.advance_cleanup_bytes as i64),
            Message::integer(status.advance_cleanup_num as i64),
            Message::bulk_string(format!("{}", status.memory_reserve).as_bytes()),
            Message::integer(status.data_version as i64),
        ])
    })
}

pub(crate) fn run_list_info(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        if tx.read_status()?.is_none() {
            return Err(ScriptAbort::new(
                Status::CollectionDeleted,
                "collection was deleted",
            ));
        }

        let list = bytes_arg(args, 1, "list")?;
        let data_key = tx.keys.data(list);
        let queue_key = tx.keys.queue();

        let items = tx.store.hlen(&data_key).map_err(ScriptAbort::internal)?;
        let oldest = if items > 0 {
            tx.store
                .zscore(&queue_key, list)
                .map_err(ScriptAbort::internal)?
        } else {
            None
        };

        Ok(vec![
            Message::integer(items as i64),
            match oldest {
                Some(time) => Message::bulk_string(fmt_time(time).as_bytes()),
                None => Message::null(),
            },
        ])
    })
}

pub(crate) fn run_verify_collection(
    store: &mut Store,
    _keys: &[Vec<u8>],
    args: &[Vec<u8>],
) -> Message {
    super::run_with_tx(store, args, |tx| {
        let older_allowed = u64_arg(args, 1, "older_allowed")?;
        let advance_cleanup_bytes = u64_arg(args, 2, "advance_cleanup_bytes")?;
        let advance_cleanup_num = u64_arg(args, 3, "advance_cleanup_num")?;
        let memory_reserve = time_arg(args, 4, "memory_reserve")?;
        let data_version = u64_arg(args, 5, "data_version")?;

        if let Some(status) = tx.read_status()? {
            // already exists: report the stored parameters for the caller
            // to validate against its own
            return Ok(vec![
                Message::integer(0),
                Message::integer(status.older_allowed as i64),
                Message::integer(status.advance_cleanup_bytes as i64),
                Message::integer(status.advance_cleanup_num as i64),
                Message::bulk_string(format!("{}", status.memory_reserve).as_bytes()),
                Message::integer(status.data_version as i64),
            ]);
        }

        debug!(
            "{}: creating collection (older_allowed={})",
            tx.keys.collection(),
            older_allowed != 0
        );

        let status_key = tx.keys.status();
        let fields: [(&'static [u8], String); 8] = [
            (FIELD_LISTS, "0".to_string()),
            (FIELD_ITEMS, "0".to_string()),
            (FIELD_OLDER_ALLOWED, older_allowed.to_string()),
            (FIELD_ADVANCE_CLEANUP_BYTES, advance_cleanup_bytes.to_string()),
            (FIELD_ADVANCE_CLEANUP_NUM, advance_cleanup_num.to_string()),
            (FIELD_MEMORY_RESERVE, format!("{}", memory_reserve)),
            (FIELD_DATA_VERSION, data_version.to_string()),
            (FIELD_LAST_REMOVED_TIME, fmt_time(0.0)),
        ];
        for (field, value) in fields {
            tx.set_status(field, &value)?;
            tx.undo_hdel(status_key.clone(), field);
        }

        Ok(vec![
            Message::integer(1),
            Message::integer((older_allowed != 0) as i64),
            Message::integer(advance_cleanup_bytes as i64),
            Message::integer(advance_cleanup_num as i64),
            Message::bulk_string(format!("{}", memory_reserve).as_bytes()),
            Message::integer(data_version as i64),
        ])
    })
}
