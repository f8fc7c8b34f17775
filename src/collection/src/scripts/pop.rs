// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Pop-oldest: remove and return the globally oldest item. Oldest-time:
//! report its data time without removing anything.

use super::context::{ScriptAbort, FIELD_ITEMS, FIELD_LISTS};
use super::Status;
use crate::time::fmt_time;

use protocol_resp::Message;
use silo_store::Store;

pub(crate) fn run_pop_oldest(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        if tx.read_status()?.is_none() {
            return Err(ScriptAbort::new(
                Status::CollectionDeleted,
                "collection was deleted",
            ));
        }

        // an existing collection with no queue is simply empty
        let item = match tx.read_head()? {
            Some(item) => item,
            None => return Ok(vec![Message::integer(0)]),
        };

        let list_removed = tx.delete_head_item(&item)?;
        tx.status_add(FIELD_ITEMS, -1)?;
        if list_removed {
            tx.status_add(FIELD_LISTS, -1)?;
        }

        Ok(vec![
            Message::integer(1),
            Message::bulk_string(&item.list),
            Message::bulk_string(&item.data),
        ])
    })
}

pub(crate) fn run_oldest_time(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        if tx.read_status()?.is_none() {
            return Err(ScriptAbort::new(
                Status::CollectionDeleted,
                "collection was deleted",
            ));
        }

        let queue_key = tx.keys.queue();
        let head = tx.store.zhead(&queue_key).map_err(ScriptAbort::internal)?;
        Ok(vec![match head {
            Some((_, time)) => Message::bulk_string(fmt_time(time).as_bytes()),
            None => Message::null(),
        }])
    })
}
