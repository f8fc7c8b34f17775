// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The transaction scripts. Each script is registered into the backing
//! store under the digest of its source descriptor and runs with exclusive
//! access to the store, so everything inside one invocation is atomic.
//!
//! Every script reply is an array whose first element is a numeric status
//! code; payload elements follow. Zero is success; the other codes map onto
//! the error taxonomy in [`crate::error`].

use metriken::{metric, Counter};
use protocol_resp::Message;
use silo_store::{ScriptFn, Store};

use std::sync::Arc;

pub(crate) mod admin;
pub(crate) mod context;
pub(crate) mod evict;
pub(crate) mod info;
pub(crate) mod insert;
pub(crate) mod pop;
pub(crate) mod receive;
pub(crate) mod update;
pub(crate) mod upsert;

pub(crate) use context::{ScriptAbort, Tx};

#[metric(name = "clean_item", description = "number of items removed by cleaning")]
pub static CLEAN_ITEM: Counter = Counter::new();

#[metric(name = "clean_list", description = "number of lists emptied by cleaning")]
pub static CLEAN_LIST: Counter = Counter::new();

#[metric(
    name = "guard_retry",
    description = "number of forced cleanings triggered by refused writes"
)]
pub static GUARD_RETRY: Counter = Counter::new();

#[metric(name = "guard_rollback", description = "number of rollback log replays")]
pub static GUARD_ROLLBACK: Counter = Counter::new();

/// Status codes carried as the first element of every script reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum Status {
    Ok = 0,
    CollectionDeleted = 1,
    DataIdExists = 2,
    OlderThanAllowed = 3,
    NonExistentDataId = 4,
    MaxMemory = 5,
    MaxMemoryPolicy = 6,
    BadArgument = 7,
    Internal = 8,
}

impl Status {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::CollectionDeleted),
            2 => Some(Self::DataIdExists),
            3 => Some(Self::OlderThanAllowed),
            4 => Some(Self::NonExistentDataId),
            5 => Some(Self::MaxMemory),
            6 => Some(Self::MaxMemoryPolicy),
            7 => Some(Self::BadArgument),
            8 => Some(Self::Internal),
            _ => None,
        }
    }
}

type Handler = fn(&mut Store, &[Vec<u8>], &[Vec<u8>]) -> Message;

/// A script: its name, the source descriptor whose digest it is dispatched
/// by, and the transaction handler itself.
pub struct ScriptDef {
    pub name: &'static str,
    pub source: &'static str,
    handler: Handler,
}

pub static INSERT: ScriptDef = ScriptDef {
    name: "insert",
    source: "silo:insert:1",
    handler: insert::run,
};
pub static UPDATE: ScriptDef = ScriptDef {
    name: "update",
    source: "silo:update:1",
    handler: update::run,
};
pub static UPSERT: ScriptDef = ScriptDef {
    name: "upsert",
    source: "silo:upsert:1",
    handler: upsert::run,
};
pub static RECEIVE: ScriptDef = ScriptDef {
    name: "receive",
    source: "silo:receive:1",
    handler: receive::run,
};
pub static POP_OLDEST: ScriptDef = ScriptDef {
    name: "pop-oldest",
    source: "silo:pop-oldest:1",
    handler: pop::run_pop_oldest,
};
pub static OLDEST_TIME: ScriptDef = ScriptDef {
    name: "oldest-time",
    source: "silo:oldest-time:1",
    handler: pop::run_oldest_time,
};
pub static COLLECTION_INFO: ScriptDef = ScriptDef {
    name: "collection-info",
    source: "silo:collection-info:1",
    handler: info::run_collection_info,
};
pub static LIST_INFO: ScriptDef = ScriptDef {
    name: "list-info",
    source: "silo:list-info:1",
    handler: info::run_list_info,
};
pub static VERIFY_COLLECTION: ScriptDef = ScriptDef {
    name: "verify-collection",
    source: "silo:verify-collection:1",
    handler: info::run_verify_collection,
};
pub static DROP_COLLECTION: ScriptDef = ScriptDef {
    name: "drop-collection",
    source: "silo:drop-collection:1",
    handler: admin::run_drop_collection,
};
pub static CLEAR_COLLECTION: ScriptDef = ScriptDef {
    name: "clear-collection",
    source: "silo:clear-collection:1",
    handler: admin::run_clear_collection,
};
pub static DROP_LIST: ScriptDef = ScriptDef {
    name: "drop-list",
    source: "silo:drop-list:1",
    handler: admin::run_drop_list,
};
pub static RESIZE: ScriptDef = ScriptDef {
    name: "resize",
    source: "silo:resize:1",
    handler: admin::run_resize,
};

pub static SCRIPTS: &[&ScriptDef] = &[
    &INSERT,
    &UPDATE,
    &UPSERT,
    &RECEIVE,
    &POP_OLDEST,
    &OLDEST_TIME,
    &COLLECTION_INFO,
    &LIST_INFO,
    &VERIFY_COLLECTION,
    &DROP_COLLECTION,
    &CLEAR_COLLECTION,
    &DROP_LIST,
    &RESIZE,
];

/// Registers every transaction script into a store. Servers call this once
/// at startup; embedded users call it before opening collections.
pub fn register_scripts(store: &mut Store) {
    for def in SCRIPTS {
        let handler: ScriptFn = Arc::new(def.handler);
        store.register_script(def.source, handler);
    }
}

// reply construction

pub(crate) fn ok_reply(payload: Vec<Message>) -> Message {
    let mut values = Vec::with_capacity(payload.len() + 1);
    values.push(Message::integer(Status::Ok.code()));
    values.extend(payload);
    Message::array(values)
}

// argument access

pub(crate) fn bytes_arg<'a>(
    args: &'a [Vec<u8>],
    index: usize,
    name: &str,
) -> Result<&'a [u8], ScriptAbort> {
    args.get(index).map(|a| a.as_slice()).ok_or_else(|| {
        ScriptAbort::new(Status::BadArgument, format!("missing argument: {}", name))
    })
}

pub(crate) fn str_arg<'a>(
    args: &'a [Vec<u8>],
    index: usize,
    name: &str,
) -> Result<&'a str, ScriptAbort> {
    core::str::from_utf8(bytes_arg(args, index, name)?).map_err(|_| {
        ScriptAbort::new(Status::BadArgument, format!("argument is not utf8: {}", name))
    })
}

pub(crate) fn time_arg(args: &[Vec<u8>], index: usize, name: &str) -> Result<f64, ScriptAbort> {
    crate::time::parse_time(bytes_arg(args, index, name)?).ok_or_else(|| {
        ScriptAbort::new(
            Status::BadArgument,
            format!("argument is not a number: {}", name),
        )
    })
}

pub(crate) fn u64_arg(args: &[Vec<u8>], index: usize, name: &str) -> Result<u64, ScriptAbort> {
    str_arg(args, index, name)?.parse().map_err(|_| {
        ScriptAbort::new(
            Status::BadArgument,
            format!("argument is not an integer: {}", name),
        )
    })
}

/// Builds a transaction around the collection named by the first argument
/// and runs `body`, replaying the rollback log if the body aborts.
pub(crate) fn run_with_tx<F>(store: &mut Store, args: &[Vec<u8>], body: F) -> Message
where
    F: FnOnce(&mut Tx) -> Result<Vec<Message>, ScriptAbort>,
{
    let collection = match str_arg(args, 0, "collection") {
        Ok(collection) => collection.to_string(),
        Err(abort) => return abort.into_reply(),
    };

    let mut tx = Tx::new(store, &collection);
    match body(&mut tx) {
        Ok(payload) => ok_reply(payload),
        Err(abort) => {
            tx.rollback();
            abort.into_reply()
        }
    }
}
