// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Receive: read one item, the item count, all values, or all id/value
//! pairs of a list. Missing collections and lists read as empty, never as
//! errors.

use super::context::ScriptAbort;
use super::{bytes_arg, str_arg, Status};

use protocol_resp::Message;
use silo_store::Store;

pub(crate) fn run(store: &mut Store, _keys: &[Vec<u8>], args: &[Vec<u8>]) -> Message {
    super::run_with_tx(store, args, |tx| {
        let list = bytes_arg(args, 1, "list")?;
        let mode = str_arg(args, 2, "mode")?;
        let data_key = tx.keys.data(list);

        match mode {
            "val" => {
                let data_id = bytes_arg(args, 3, "data_id")?;
                let value = tx
                    .store
                    .hget(&data_key, data_id)
                    .map_err(ScriptAbort::internal)?;
                Ok(vec![match value {
                    Some(v) => Message::bulk_string(v),
                    None => Message::null(),
                }])
            }
            "len" => {
                let len = tx.store.hlen(&data_key).map_err(ScriptAbort::internal)?;
                Ok(vec![Message::integer(len as i64)])
            }
            "vals" => {
                let vals = tx.store.hvals(&data_key).map_err(ScriptAbort::internal)?;
                Ok(vec![Message::array(
                    vals.iter().map(|v| Message::bulk_string(v)).collect(),
                )])
            }
            "all" => {
                let pairs = tx.store.hgetall(&data_key).map_err(ScriptAbort::internal)?;
                let mut values = Vec::with_capacity(pairs.len() * 2);
                for (field, value) in pairs {
                    values.push(Message::bulk_string(&field));
                    values.push(Message::bulk_string(&value));
                }
                Ok(vec![Message::array(values)])
            }
            _ => Err(ScriptAbort::new(
                Status::BadArgument,
                format!("unknown receive mode: {}", mode),
            )),
        }
    })
}
