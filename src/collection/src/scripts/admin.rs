// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Maintenance scripts: destroy or empty a collection, drop one list, and
//! resize the status record's policy fields. Dropping and clearing
//! enumerate the collection's keys by glob, which is linear in the number
//! of lists.

use super::context::{
    ScriptAbort, FIELD_ADVANCE_CLEANUP_BYTES, FIELD_ADVANCE_CLEANUP_NUM, FIELD_ITEMS,
    FIELD_LISTS, FIELD_MEMORY_RESERVE, FIELD_OLDER_ALLOWED,
};
use super::{bytes_arg, str_arg, Status, Tx};
use crate::params::{MEMORY_RESERVE_MAX, MEMORY_RESERVE_MIN};

use protocol_resp::Message;
use silo_store::Store;

fn purge_keys(tx: &mut Tx) -> u64 {
    let mut deleted = 0u64;
    let globs = [tx.keys.data_glob(), tx.keys.time_glob()];
    for glob in globs {
        for key in tx.store.keys_matching(&glob) {
            if tx.store.del(&key) {
                deleted += 1;
            }
        }
    }
    deleted
}

pub(crate) fn run_drop_collection(
    store: &mut Store,
    _keys: &[Vec<u8>],
    args: &[Vec<u8>],
) -> Message {
    super::run_with_tx(store, args, |tx| {
        let mut deleted = 0u64;
        let status_key = tx.keys.status();
        let queue_key = tx.keys.queue();
        if tx.store.del(&status_key) {
            deleted += 1;
        }
        if tx.store.del(&queue_key) {
            deleted += 1;
        }
        deleted += purge_keys(tx);
        info!("{}: dropped, {} keys deleted", tx.keys.collection(), deleted);
        Ok(vec![Message::integer(deleted as i64)])
    })
}

pub(crate) fn run_clear_collection(
    store: &mut Store,
    _keys: &[Vec<u8>],
    args: &[Vec<u8>],
) -> Message {
    super::run_with_tx(store, args, |tx| {
        let mut deleted = 0u64;
        let queue_key = tx.keys.queue();
        if tx.store.del(&queue_key) {
            deleted += 1;
        }
        deleted += purge_keys(tx);

        // configuration fields survive a clear; only the counters and the
        // removal watermark reset
        if tx.read_status()?.is_some() {
            tx.set_status(FIELD_LISTS, "0")?;
            tx.set_status(FIELD_ITEMS, "0")?;
            tx.set_last_removed_time(0.0)?;
        }

        info!("{}: cleared, {} keys deleted", tx.keys.collection(), deleted);
        Ok(vec![Message::integer(deleted as i64)])
    })
}

pub(crate) fn run_drop_list(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        if tx.read_status()?.is_none() {
            return Err(ScriptAbort::new(
                Status::CollectionDeleted,
                "collection was deleted",
            ));
        }

        let list = bytes_arg(args, 1, "list")?;
        let data_key = tx.keys.data(list);
        let time_key = tx.keys.time(list);
        let queue_key = tx.keys.queue();

        let items = tx.store.hlen(&data_key).map_err(ScriptAbort::internal)?;
        if items == 0 {
            return Ok(vec![Message::integer(0)]);
        }

        tx.store.del(&data_key);
        tx.store.del(&time_key);
        tx.store
            .zrem(&queue_key, list)
            .map_err(ScriptAbort::internal)?;

        tx.status_add(FIELD_ITEMS, -(items as i64))?;
        tx.status_add(FIELD_LISTS, -1)?;

        Ok(vec![Message::integer(1)])
    })
}

pub(crate) fn run_resize(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        let status = tx.read_status()?.ok_or(ScriptAbort::new(
            Status::CollectionDeleted,
            "collection was deleted",
        ))?;

        if args.len() < 3 || (args.len() - 1) % 2 != 0 {
            return Err(ScriptAbort::new(
                Status::BadArgument,
                "expected field/value pairs",
            ));
        }

        let mut changed = 0u64;
        let mut index = 1;
        while index + 1 < args.len() {
            let field = str_arg(args, index, "field")?;
            let value = str_arg(args, index + 1, "value")?;
            index += 2;

            match field {
                "older_allowed" => {
                    let new: u64 = parse_field(value, field)?;
                    if new > 1 {
                        return Err(ScriptAbort::new(
                            Status::BadArgument,
                            "older_allowed must be 0 or 1",
                        ));
                    }
                    if (new != 0) != status.older_allowed {
                        tx.set_status(FIELD_OLDER_ALLOWED, &new.to_string())?;
                        changed += 1;
                    }
                }
                "advance_cleanup_bytes" => {
                    let new: u64 = parse_field(value, field)?;
                    if new != status.advance_cleanup_bytes {
                        tx.set_status(FIELD_ADVANCE_CLEANUP_BYTES, &new.to_string())?;
                        changed += 1;
                    }
                }
                "advance_cleanup_num" => {
                    let new: u64 = parse_field(value, field)?;
                    if new != status.advance_cleanup_num {
                        tx.set_status(FIELD_ADVANCE_CLEANUP_NUM, &new.to_string())?;
                        changed += 1;
                    }
                }
                "memory_reserve" => {
                    let new: f64 = parse_field(value, field)?;
                    if !(MEMORY_RESERVE_MIN..=MEMORY_RESERVE_MAX).contains(&new) {
                        return Err(ScriptAbort::new(
                            Status::BadArgument,
                            "memory_reserve out of range",
                        ));
                    }
                    if new != status.memory_reserve {
                        tx.set_status(FIELD_MEMORY_RESERVE, &format!("{}", new))?;
                        changed += 1;
                    }
                }
                _ => {
                    return Err(ScriptAbort::new(
                        Status::BadArgument,
                        format!("unknown status field: {}", field),
                    ));
                }
            }
        }

        Ok(vec![Message::integer(changed as i64)])
    })
}

fn parse_field<T: core::str::FromStr>(value: &str, field: &str) -> Result<T, ScriptAbort> {
    value.parse().map_err(|_| {
        ScriptAbort::new(
            Status::BadArgument,
            format!("invalid value for {}", field),
        )
    })
}
