// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Upsert: dispatch to update when the data id is present, insert when it is
//! not. The caller supplies both its optional time (zero for "none") and the
//! current wall-clock time; the insert branch of a timeless upsert stamps
//! the item with the latter.

use super::context::ScriptAbort;
use super::{bytes_arg, str_arg, time_arg, Status};
use super::{insert, update};

use protocol_resp::Message;
use silo_store::Store;

pub(crate) fn run(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        let list = bytes_arg(args, 1, "list")?;
        let data_id = bytes_arg(args, 2, "data_id")?;
        let data = bytes_arg(args, 3, "data")?;
        let data_time = time_arg(args, 4, "data_time")?;
        let now = time_arg(args, 5, "now")?;
        let debug_id = str_arg(args, 6, "debug_id").unwrap_or("-");

        let data_key = tx.keys.data(list);
        let exists = tx
            .store
            .hexists(&data_key, data_id)
            .map_err(ScriptAbort::internal)?;

        let payload = if exists {
            update::apply(tx, list, data_id, data, data_time)?
        } else {
            let time = if data_time == 0.0 { now } else { data_time };
            if time <= 0.0 {
                return Err(ScriptAbort::new(
                    Status::BadArgument,
                    "data time must be positive",
                ));
            }
            insert::apply(tx, list, data_id, data, time)?
        };

        trace!(
            "upsert[{}]: {}/{} existing={}",
            debug_id,
            tx.keys.collection(),
            String::from_utf8_lossy(list),
            exists
        );

        // both branches lead with the cleanings count
        Ok(vec![payload
            .into_iter()
            .next()
            .unwrap_or(Message::integer(0))])
    })
}
